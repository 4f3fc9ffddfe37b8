use crate::error::{QuantError, Result};
use serde::{Deserialize, Serialize};

/// Memory order of an `N × C` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    /// Each group of `C` consecutive values is one sample.
    BatchMajor,
    /// All samples of channel 0, then channel 1, ...
    ChannelMajor,
}

impl Layout {
    #[inline(always)]
    pub fn offset(self, sample: usize, channel: usize, samples: usize, channels: usize) -> usize {
        match self {
            Layout::BatchMajor => sample * channels + channel,
            Layout::ChannelMajor => channel * samples + sample,
        }
    }
}

/// Borrowed, shape-checked view over caller activations.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    data: &'a [f32],
    channels: usize,
    layout: Layout,
}

impl<'a> Batch<'a> {
    pub fn new(data: &'a [f32], channels: usize, layout: Layout) -> Result<Self> {
        if channels == 0 {
            return Err(QuantError::ZeroChannels);
        }
        if data.len() % channels != 0 {
            return Err(QuantError::ShapeMismatch {
                len: data.len(),
                channels,
            });
        }
        Ok(Self {
            data,
            channels,
            layout,
        })
    }

    pub fn batch_major(data: &'a [f32], channels: usize) -> Result<Self> {
        Self::new(data, channels, Layout::BatchMajor)
    }

    pub fn channel_major(data: &'a [f32], channels: usize) -> Result<Self> {
        Self::new(data, channels, Layout::ChannelMajor)
    }

    pub fn data(&self) -> &'a [f32] {
        self.data
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn samples(&self) -> usize {
        self.data.len() / self.channels
    }

    #[inline(always)]
    pub fn value(&self, sample: usize, channel: usize) -> f32 {
        self.data[self.layout.offset(sample, channel, self.samples(), self.channels)]
    }

    /// Copies the values of one channel in sample order.
    pub fn channel_values(&self, channel: usize) -> Vec<f32> {
        match self.layout {
            Layout::ChannelMajor => {
                let n = self.samples();
                self.data[channel * n..(channel + 1) * n].to_vec()
            }
            Layout::BatchMajor => self
                .data
                .iter()
                .skip(channel)
                .step_by(self.channels)
                .copied()
                .collect(),
        }
    }

    /// Re-lays the values out in `layout`.
    pub fn to_layout(&self, layout: Layout) -> Vec<f32> {
        transpose(self.data, self.samples(), self.channels, self.layout, layout)
    }
}

/// Quantized output. Mirrors the layout of the batch it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codes {
    data: Vec<i8>,
    channels: usize,
    layout: Layout,
}

impl Codes {
    pub(crate) fn from_parts(data: Vec<i8>, channels: usize, layout: Layout) -> Self {
        debug_assert!(channels > 0 && data.len() % channels == 0);
        Self {
            data,
            channels,
            layout,
        }
    }

    pub fn as_slice(&self) -> &[i8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<i8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn samples(&self) -> usize {
        self.data.len() / self.channels
    }

    pub fn get(&self, sample: usize, channel: usize) -> i8 {
        self.data[self.layout.offset(sample, channel, self.samples(), self.channels)]
    }

    pub fn into_layout(self, layout: Layout) -> Self {
        if layout == self.layout {
            return self;
        }
        let data = transpose(&self.data, self.samples(), self.channels, self.layout, layout);
        Self {
            data,
            channels: self.channels,
            layout,
        }
    }
}

fn transpose<T: Copy>(data: &[T], samples: usize, channels: usize, from: Layout, to: Layout) -> Vec<T> {
    if from == to {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len());
    match to {
        Layout::ChannelMajor => {
            for c in 0..channels {
                for s in 0..samples {
                    out.push(data[from.offset(s, c, samples, channels)]);
                }
            }
        }
        Layout::BatchMajor => {
            for s in 0..samples {
                for c in 0..channels {
                    out.push(data[from.offset(s, c, samples, channels)]);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_is_checked_up_front() {
        let data = [0.0f32; 7];
        match Batch::batch_major(&data, 3) {
            Err(QuantError::ShapeMismatch { len, channels }) => {
                assert_eq!((len, channels), (7, 3));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(Batch::batch_major(&data, 0), Err(QuantError::ZeroChannels)));
        assert!(Batch::batch_major(&[], 4).unwrap().is_empty());
    }

    #[test]
    fn test_layout_views_agree() {
        // 2 samples, 3 channels
        let bm = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let batch = Batch::batch_major(&bm, 3).unwrap();
        let cm = batch.to_layout(Layout::ChannelMajor);
        assert_eq!(cm, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        let other = Batch::channel_major(&cm, 3).unwrap();
        for s in 0..2 {
            for c in 0..3 {
                assert_eq!(batch.value(s, c), other.value(s, c));
            }
        }
        assert_eq!(batch.channel_values(1), vec![2.0, 5.0]);
        assert_eq!(other.channel_values(1), vec![2.0, 5.0]);
        assert_eq!(other.to_layout(Layout::BatchMajor), bm.to_vec());
    }

    #[test]
    fn test_codes_relayout() {
        let codes = Codes::from_parts(vec![1, 2, 3, 4, 5, 6], 3, Layout::BatchMajor);
        let cm = codes.clone().into_layout(Layout::ChannelMajor);
        assert_eq!(cm.as_slice(), &[1, 4, 2, 5, 3, 6]);
        assert_eq!(cm.get(1, 2), 6);
        assert_eq!(cm.into_layout(Layout::BatchMajor), codes);
    }
}
