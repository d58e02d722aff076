//! Real-time gain processing
//!
//! Design constraints:
//! - No allocations, locks or logging.
//! - One parameter read per block; the gain is constant for the whole block.
//!
//! There is no smoothing between blocks, so fast automation can step
//! audibly at block boundaries.

use std::sync::Arc;

use crate::parameter::ParameterStore;

/// Applies the shared gain to audio blocks
pub struct AudioEngine {
    params: Arc<ParameterStore>,
}

impl AudioEngine {
    pub fn new(params: Arc<ParameterStore>) -> Self {
        Self { params }
    }

    /// Process one block in place.
    ///
    /// `channels` holds every output channel; the first `num_input_channels`
    /// of them carry input audio. Those are scaled by the current gain, the
    /// rest are cleared. At most `num_samples` samples per channel are touched.
    pub fn process(
        &self,
        channels: &mut [&mut [f32]],
        num_input_channels: usize,
        num_samples: usize,
    ) {
        let gain = self.params.read();
        let num_inputs = num_input_channels.min(channels.len());
        let (inputs, extra) = channels.split_at_mut(num_inputs);

        for channel in extra.iter_mut() {
            let len = num_samples.min(channel.len());
            channel[..len].fill(0.0);
        }

        for channel in inputs.iter_mut() {
            let len = num_samples.min(channel.len());
            for sample in channel[..len].iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Gain that the next block will use
    pub fn current_gain(&self) -> f32 {
        self.params.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_gain(gain: f32) -> AudioEngine {
        AudioEngine::new(Arc::new(ParameterStore::new(gain)))
    }

    #[test]
    fn test_gain_applied_to_every_input_channel() {
        let engine = engine_with_gain(0.5);
        let mut left = vec![0.8f32; 64];
        let mut right = vec![-0.4f32; 64];
        {
            let mut channels: [&mut [f32]; 2] = [&mut left, &mut right];
            engine.process(&mut channels, 2, 64);
        }

        assert!(left.iter().all(|&s| s == 0.8 * 0.5));
        assert!(right.iter().all(|&s| s == -0.4 * 0.5));
    }

    #[test]
    fn test_extra_output_channels_are_silenced() {
        let engine = engine_with_gain(1.0);
        let mut mono_in = vec![0.3f32; 32];
        let mut garbage = vec![0.9f32; 32];
        {
            let mut channels: [&mut [f32]; 2] = [&mut mono_in, &mut garbage];
            engine.process(&mut channels, 1, 32);
        }

        assert!(mono_in.iter().all(|&s| s == 0.3));
        assert!(garbage.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_only_block_length_is_touched() {
        let engine = engine_with_gain(0.0);
        let mut buffer = vec![1.0f32; 16];
        {
            let mut channels: [&mut [f32]; 1] = [&mut buffer];
            engine.process(&mut channels, 1, 8);
        }

        assert!(buffer[..8].iter().all(|&s| s == 0.0));
        assert!(buffer[8..].iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_gain_change_takes_effect_next_block() {
        let params = Arc::new(ParameterStore::new(1.0));
        let engine = AudioEngine::new(params.clone());
        let mut buffer = vec![1.0f32; 4];

        {
            let mut channels: [&mut [f32]; 1] = [&mut buffer];
            engine.process(&mut channels, 1, 4);
        }
        assert_eq!(buffer, vec![1.0; 4]);

        params.write(0.25);
        {
            let mut channels: [&mut [f32]; 1] = [&mut buffer];
            engine.process(&mut channels, 1, 4);
        }
        assert_eq!(buffer, vec![0.25; 4]);
        assert_eq!(engine.current_gain(), 0.25);
    }

    #[test]
    fn test_more_inputs_than_outputs() {
        let engine = engine_with_gain(0.5);
        let mut buffer = vec![1.0f32; 4];
        {
            let mut channels: [&mut [f32]; 1] = [&mut buffer];
            engine.process(&mut channels, 2, 4);
        }
        assert_eq!(buffer, vec![0.5; 4]);
    }

    #[test]
    fn test_empty_block() {
        let engine = engine_with_gain(0.5);
        let mut channels: [&mut [f32]; 0] = [];
        engine.process(&mut channels, 0, 128);
    }
}
