//! Burst Buffers and Tagged Streams
//!
//! A [`BurstBuffer`] is the unit of work between pipeline stages: a
//! contiguous run of I/Q samples cut out of the input stream, annotated with
//! the capture offset at which it started. Buffers are uniquely owned and
//! moved stage to stage; the pipeline is strictly linear.
//!
//! A [`TaggedStream`] is the sample-accurate companion interface: stages that
//! re-emit samples mark burst boundaries with inline [`StreamTag`]s, so
//! collaborators that cannot consume whole-burst messages can still recover
//! exact framing.

use crate::types::IQSample;

/// Kind of an inline stream marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// First sample of a burst. Carries the total burst length.
    BurstStart { total_len: u64 },
    /// Last sample of a burst. Carries the total burst length.
    BurstEnd { total_len: u64 },
}

/// An inline marker attached to a sample offset of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTag {
    /// Absolute sample offset (items written on that stream) the tag sits on.
    pub offset: u64,
    pub kind: TagKind,
}

/// An isolated burst: samples plus the capture offset of its first sample.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstBuffer {
    /// Burst samples, trailing silence included.
    pub samples: Vec<IQSample>,
    /// Sample index into the original stream at which the burst started.
    pub capture_offset: u64,
}

impl BurstBuffer {
    pub fn new(samples: Vec<IQSample>, capture_offset: u64) -> Self {
        Self {
            samples,
            capture_offset,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Burst duration in milliseconds at the given sample rate.
    pub fn duration_ms(&self, sample_rate: f64) -> f64 {
        self.samples.len() as f64 * 1000.0 / sample_rate
    }
}

/// A bounded sample sink with inline tags.
///
/// Stages write into a caller-provided `TaggedStream` and stop when
/// [`TaggedStream::remaining`] hits zero; the caller drains it and invokes
/// the stage again. Tag offsets are absolute (monotonic across drains).
#[derive(Debug, Clone)]
pub struct TaggedStream {
    samples: Vec<IQSample>,
    tags: Vec<StreamTag>,
    /// Bound on samples held at once; mirrors a scheduler's output buffer.
    capacity: usize,
    /// Absolute offset of the next sample written.
    written: u64,
}

impl TaggedStream {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::new(),
            tags: Vec::new(),
            capacity,
            written: 0,
        }
    }

    /// Samples that can still be written before the stream is full.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.samples.len())
    }

    /// Absolute offset of the next sample to be written.
    pub fn next_offset(&self) -> u64 {
        self.written
    }

    /// Append one sample, returning its absolute offset.
    pub fn push(&mut self, sample: IQSample) -> u64 {
        debug_assert!(self.remaining() > 0);
        let offset = self.written;
        self.samples.push(sample);
        self.written += 1;
        offset
    }

    /// Attach a tag at an absolute offset.
    pub fn add_tag(&mut self, offset: u64, kind: TagKind) {
        self.tags.push(StreamTag { offset, kind });
    }

    /// Samples currently buffered (since the last drain).
    pub fn samples(&self) -> &[IQSample] {
        &self.samples
    }

    /// Tags currently buffered (since the last drain).
    pub fn tags(&self) -> &[StreamTag] {
        &self.tags
    }

    /// Take everything buffered, freeing capacity for the next stage call.
    pub fn drain(&mut self) -> (Vec<IQSample>, Vec<StreamTag>) {
        (
            std::mem::take(&mut self.samples),
            std::mem::take(&mut self.tags),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn test_burst_duration() {
        let burst = BurstBuffer::new(vec![Complex64::new(1.0, 0.0); 4000], 0);
        assert!((burst.duration_ms(40_000.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_tagged_stream_offsets_survive_drain() {
        let mut out = TaggedStream::new(4);
        for i in 0..4 {
            out.push(Complex64::new(i as f64, 0.0));
        }
        assert_eq!(out.remaining(), 0);
        let (samples, _) = out.drain();
        assert_eq!(samples.len(), 4);
        assert_eq!(out.remaining(), 4);

        let offset = out.push(Complex64::new(0.0, 0.0));
        assert_eq!(offset, 4, "offsets are absolute across drains");
    }

    #[test]
    fn test_tags_attach_to_offsets() {
        let mut out = TaggedStream::new(16);
        let start = out.push(Complex64::new(1.0, 0.0));
        out.add_tag(start, TagKind::BurstStart { total_len: 2 });
        let end = out.push(Complex64::new(1.0, 0.0));
        out.add_tag(end, TagKind::BurstEnd { total_len: 2 });

        let (_, tags) = out.drain();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].offset, 0);
        assert_eq!(tags[1].offset, 1);
    }
}
