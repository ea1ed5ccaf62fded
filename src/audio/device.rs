/// Audio output using cpal
use super::Mixer;
use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use log::{error, info};

/// A running output stream that pulls every block from a [`Mixer`].
/// Playback stops when this is dropped.
pub struct AudioDevice {
    _stream: cpal::Stream,
    sample_rate: u32,
    channels: usize,
}

impl AudioDevice {
    /// Opens the named output device, or the default one, and starts
    /// streaming. The mixer is retuned to the device's sample rate.
    pub fn open(mixer: &Mixer, device_name: Option<&str>) -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let device = device_name
            .and_then(|device_name| {
                host.output_devices()
                    .ok()?
                    .find(|device| device.name().is_ok_and(|name| name == device_name))
            })
            .or_else(|| host.default_output_device())
            .ok_or(AudioError::NoDevice)?;

        let config = device.default_output_config()?;
        let sample_format = config.sample_format();

        let config: cpal::StreamConfig = config.into();
        let sample_rate = config.sample_rate.0;
        let channels = usize::from(config.channels);
        mixer.set_sample_rate(sample_rate);

        info!("starting {sample_format} output stream with config {config:?}");

        let mixer = mixer.clone();
        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.render(data, channels);
                },
                |err| error!("audio stream error: {err}"),
                None,
            )?,
            cpal::SampleFormat::I16 => build_converting_stream::<i16>(&device, &config, mixer)?,
            cpal::SampleFormat::U16 => build_converting_stream::<u16>(&device, &config, mixer)?,
            sample_format => return Err(AudioError::UnsupportedSampleFormat(sample_format)),
        };

        stream.play()?;

        Ok(Self {
            _stream: stream,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl std::fmt::Debug for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDevice")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

/// Stream for devices that take integer samples. The mixer renders into a
/// float block that is converted on the way out.
fn build_converting_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Mixer,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels);
    let mut block = Vec::new();

    Ok(device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            block.resize(data.len(), 0.0);
            mixer.render(&mut block, channels);
            convert_block(&block, data);
        },
        |err| error!("audio stream error: {err}"),
        None,
    )?)
}

fn convert_block<T>(block: &[f32], data: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    for (out, sample) in data.iter_mut().zip(block) {
        *out = T::from_sample(*sample);
    }
}

/// Names of the output devices the default host can see.
pub fn output_devices() -> Vec<String> {
    cpal::default_host()
        .output_devices()
        .map(|devices| devices.filter_map(|device| device.name().ok()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_block_to_integer_samples() {
        let block = [0.0, 1.0, -1.0, 0.5];

        let mut signed = [7_i16; 4];
        convert_block(&block, &mut signed);
        assert_eq!(signed[0], 0);
        assert_eq!(signed[1], i16::MAX);
        assert_eq!(signed[2], i16::MIN);
        assert!(signed[3] > 16_000 && signed[3] < 16_500);

        let mut unsigned = [0_u16; 4];
        convert_block(&block, &mut unsigned);
        assert_eq!(unsigned[0], 32_768);
        assert_eq!(unsigned[2], 0);
    }
}
