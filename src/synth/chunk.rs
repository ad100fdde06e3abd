//! Fixed-size multi-channel sample blocks.

/// Number of coil channels driven by the generator.
pub const CHANNELS: usize = 3;

/// Coil channel identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; CHANNELS] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// One synthesis interval's worth of samples for all three channels.
///
/// Allocated once per synthesis call and owned by the caller until it is
/// handed to the device write, after which it is considered consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformChunk {
    len: usize,
    data: [Vec<f64>; CHANNELS],
}

impl WaveformChunk {
    /// Build a chunk by evaluating `f` at every sample index.
    ///
    /// `f` returns one `[x, y, z]` frame per index.
    pub fn from_fn<F>(len: usize, mut f: F) -> Self
    where
        F: FnMut(usize) -> [f64; CHANNELS],
    {
        let mut data = [
            Vec::with_capacity(len),
            Vec::with_capacity(len),
            Vec::with_capacity(len),
        ];
        for i in 0..len {
            let frame = f(i);
            for (channel, sample) in data.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self { len, data }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Samples for one channel.
    pub fn channel(&self, axis: Axis) -> &[f64] {
        &self.data[axis.index()]
    }

    /// Channel-interleaved f32 samples (x0, y0, z0, x1, ...), the frame layout
    /// the output device consumes.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len * CHANNELS);
        for i in 0..self.len {
            for channel in &self.data {
                out.push(channel[i] as f32);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_fills_channels() {
        let chunk = WaveformChunk::from_fn(4, |i| [i as f64, 10.0 + i as f64, -(i as f64)]);
        assert_eq!(chunk.len(), 4);
        assert_eq!(chunk.channel(Axis::X), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(chunk.channel(Axis::Y), &[10.0, 11.0, 12.0, 13.0]);
        assert_eq!(chunk.channel(Axis::Z), &[0.0, -1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_interleaved_frame_order() {
        let chunk = WaveformChunk::from_fn(2, |i| [i as f64, 10.0 + i as f64, 20.0 + i as f64]);
        assert_eq!(
            chunk.interleaved(),
            vec![0.0, 10.0, 20.0, 1.0, 11.0, 21.0]
        );
    }

    #[test]
    fn test_empty_chunk() {
        let chunk = WaveformChunk::from_fn(0, |_| [0.0; CHANNELS]);
        assert!(chunk.is_empty());
        assert!(chunk.interleaved().is_empty());
    }

    #[test]
    fn test_axis_indices() {
        assert_eq!(Axis::X.index(), 0);
        assert_eq!(Axis::Y.index(), 1);
        assert_eq!(Axis::Z.index(), 2);
    }
}
