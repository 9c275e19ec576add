use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use spectrum_analyzer::scaling::scale_to_zero_to_one;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{samples_fft_to_spectrum, FrequencyLimit};

/// FFT window length in samples. Must be a power of two.
pub const FFT_WINDOW: usize = 256;
/// Frequency bins the analyzer produces, one visualizer bar each.
pub const FREQUENCY_BINS: usize = FFT_WINDOW / 2;

/// Samples retained for analysis; a few windows of headroom so the UI
/// thread never races an empty buffer.
const TAP_CAPACITY: usize = FFT_WINDOW * 4;

type SharedSamples = Arc<Mutex<VecDeque<f32>>>;

/// Read side of the sample buffer: turns the most recent window of audio
/// into byte-scaled frequency bins, like an analyser node with
/// `fftSize = 256` would.
#[derive(Clone)]
pub struct SpectrumTap {
    samples: SharedSamples,
    sample_rate: u32,
}

impl SpectrumTap {
    /// `None` until a full window of samples has flowed through, or if the
    /// FFT rejects the window.
    pub fn frequency_bins(&self) -> Option<Vec<u8>> {
        let window: Vec<f32> = {
            let samples = self.samples.lock().ok()?;
            if samples.len() < FFT_WINDOW {
                return None;
            }
            samples.iter().skip(samples.len() - FFT_WINDOW).copied().collect()
        };

        let windowed = hann_window(&window);
        let spectrum = samples_fft_to_spectrum(
            &windowed,
            self.sample_rate,
            FrequencyLimit::All,
            Some(&scale_to_zero_to_one),
        )
        .ok()?;

        let mut bins = vec![0u8; FREQUENCY_BINS];
        for (slot, (_, value)) in bins.iter_mut().zip(spectrum.data().iter()) {
            *slot = (value.val() * 255.0).clamp(0.0, 255.0) as u8;
        }
        Some(bins)
    }
}

/// Pass-through source that copies every sample into the shared buffer on
/// its way to the sink.
struct TapSource<S> {
    inner: S,
    samples: SharedSamples,
}

impl<S> Iterator for TapSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.inner.next();
        if let Some(value) = sample {
            if let Ok(mut samples) = self.samples.lock() {
                samples.push_back(value);
                while samples.len() > TAP_CAPACITY {
                    samples.pop_front();
                }
            }
        }
        sample
    }
}

impl<S> Source for TapSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

/// Local audio playback with a spectrum tap. The output device is opened
/// lazily on first load; every failure degrades to a logged no-op so the
/// rest of the shell keeps working without a sound device.
pub struct AudioPlayer {
    _stream: Option<OutputStream>,
    handle: Option<OutputStreamHandle>,
    sink: Option<Sink>,
    samples: SharedSamples,
    sample_rate: u32,
    tap_failed: bool,
}

impl AudioPlayer {
    pub fn new() -> Self {
        Self {
            _stream: None,
            handle: None,
            sink: None,
            samples: Arc::new(Mutex::new(VecDeque::new())),
            sample_rate: 0,
            tap_failed: false,
        }
    }

    fn ensure_output(&mut self) -> Result<&OutputStreamHandle> {
        if self.handle.is_none() {
            let (stream, handle) =
                OutputStream::try_default().context("Failed to open audio output device")?;
            self._stream = Some(stream);
            self.handle = Some(handle);
        }
        Ok(self.handle.as_ref().expect("handle was just set"))
    }

    /// Decodes `path` into a paused, infinitely looping sink with the tap
    /// attached. Replaces any previous track.
    pub fn load(&mut self, path: &Path, gain: f32) -> Result<()> {
        if let Some(old) = self.sink.take() {
            old.stop();
        }
        if let Ok(mut samples) = self.samples.lock() {
            samples.clear();
        }

        let file = File::open(path)
            .with_context(|| format!("Failed to open audio track: {}", path.display()))?;
        let decoder = Decoder::new(BufReader::new(file))
            .with_context(|| format!("Failed to decode audio track: {}", path.display()))?;
        let source = decoder.convert_samples::<f32>().repeat_infinite();
        self.sample_rate = source.sample_rate();

        let handle = self.ensure_output()?;
        let sink = Sink::try_new(handle).map_err(|e| anyhow!("Failed to create sink: {e}"))?;
        sink.set_volume(gain.clamp(0.0, 1.0));
        sink.append(TapSource {
            inner: source,
            samples: Arc::clone(&self.samples),
        });
        sink.pause();
        self.sink = Some(sink);
        Ok(())
    }

    pub fn has_track(&self) -> bool {
        self.sink.is_some()
    }

    /// Reconciles the sink against the desired playback state.
    pub fn set_paused(&self, paused: bool) {
        if let Some(sink) = &self.sink {
            if paused {
                sink.pause();
            } else {
                sink.play();
            }
        }
    }

    pub fn set_gain(&self, gain: f32) {
        if let Some(sink) = &self.sink {
            sink.set_volume(gain.clamp(0.0, 1.0));
        }
    }

    /// Binds an analyzer to the loaded track. Fails at most once per
    /// session: after the first failure the visualizer stays on its
    /// synthetic source and no further attempts are made.
    pub fn spectrum_tap(&mut self) -> Option<SpectrumTap> {
        if self.tap_failed {
            return None;
        }
        if self.sink.is_none() || self.sample_rate == 0 {
            log::warn!("no analyzable audio source, visualizer falls back to synthetic bars");
            self.tap_failed = true;
            return None;
        }
        Some(SpectrumTap {
            samples: Arc::clone(&self.samples),
            sample_rate: self.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodio::buffer::SamplesBuffer;

    fn tap_over(samples: Vec<f32>, sample_rate: u32) -> (SpectrumTap, Vec<f32>) {
        let shared: SharedSamples = Arc::new(Mutex::new(VecDeque::new()));
        let source = SamplesBuffer::new(1, sample_rate, samples);
        let tap_source = TapSource {
            inner: source,
            samples: Arc::clone(&shared),
        };
        let drained: Vec<f32> = tap_source.collect();
        (
            SpectrumTap {
                samples: shared,
                sample_rate,
            },
            drained,
        )
    }

    #[test]
    fn tap_source_passes_audio_through_unchanged() {
        let input: Vec<f32> = (0..512).map(|i| (i as f32 / 64.0).sin()).collect();
        let (tap, drained) = tap_over(input.clone(), 44_100);
        assert_eq!(drained, input);
        let recorded = tap.samples.lock().unwrap();
        assert_eq!(recorded.len(), TAP_CAPACITY.min(input.len()));
    }

    #[test]
    fn bins_need_a_full_window() {
        let (tap, _) = tap_over(vec![0.5; FFT_WINDOW - 1], 44_100);
        assert!(tap.frequency_bins().is_none());
    }

    #[test]
    fn sine_feed_produces_a_dominant_bin() {
        let sample_rate = 44_100u32;
        let freq = 4_000.0f32;
        let input: Vec<f32> = (0..1024)
            .map(|i| (std::f32::consts::TAU * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        let (tap, _) = tap_over(input, sample_rate);

        let bins = tap.frequency_bins().expect("full window recorded");
        assert_eq!(bins.len(), FREQUENCY_BINS);

        let loudest = bins
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| **v)
            .map(|(i, _)| i)
            .unwrap();
        // 4 kHz at 44.1 kHz / 256-point FFT lands around bin 23.
        let expected = (freq / (sample_rate as f32 / FFT_WINDOW as f32)).round() as usize;
        assert!(
            loudest.abs_diff(expected) <= 1,
            "dominant bin {loudest}, expected near {expected}"
        );
        assert_eq!(*bins.iter().max().unwrap(), 255);
    }

    #[test]
    fn tap_failure_is_remembered() {
        let mut player = AudioPlayer::new();
        assert!(player.spectrum_tap().is_none());
        // Second call takes the cached-failure path.
        assert!(player.tap_failed);
        assert!(player.spectrum_tap().is_none());
    }
}
