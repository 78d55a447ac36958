// ============================================================================
// AUDIO CLIP: mono sample buffer editing for the audio collaborator
// ============================================================================
//
// Selections are given in seconds and truncated to sample indices. An empty
// selection (`start == end`) means "the whole track" for effects and "nothing"
// for clipboard operations. Every effect peak-normalizes what it produced.
// Clips load from and save to WAV; playback lives outside this crate.
// ============================================================================

use std::path::Path;

use rayon::prelude::*;

use crate::error::{EditorError, OpOutcome};

/// Effects offered by the audio editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AudioEffect {
    /// ×1.5 gain.
    Amplify,
    /// Silence samples quieter than [`NOISE_GATE_THRESHOLD`].
    NoiseGate,
    /// Single echo [`REVERB_DELAY_SECS`] later at [`REVERB_DECAY`].
    Reverb,
    Reverse,
}

pub const AMPLIFY_GAIN: f32 = 1.5;
pub const NOISE_GATE_THRESHOLD: f32 = 0.02;
pub const REVERB_DELAY_SECS: f32 = 0.2;
pub const REVERB_DECAY: f32 = 0.5;

impl AudioEffect {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "amplify" => Some(AudioEffect::Amplify),
            "noise_gate" => Some(AudioEffect::NoiseGate),
            "reverb" => Some(AudioEffect::Reverb),
            "reverse" => Some(AudioEffect::Reverse),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AudioEffect::Amplify => "amplify",
            AudioEffect::NoiseGate => "noise_gate",
            AudioEffect::Reverb => "reverb",
            AudioEffect::Reverse => "reverse",
        }
    }
}

/// Average interleaved frames of `channels` samples down to one channel.
/// A trailing partial frame is dropped.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Scale so the loudest sample has magnitude 1.0. Silence is left alone.
pub fn normalize_peak(samples: &mut [f32]) {
    let peak = samples.par_iter().map(|s| s.abs()).reduce(|| 0.0, f32::max);
    if peak > 0.0 {
        samples.par_iter_mut().for_each(|s| *s /= peak);
    }
}

/// A mono clip plus its clipboard.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    clipboard: Option<Vec<f32>>,
    unsaved_changes: bool,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate, clipboard: None, unsaved_changes: false }
    }

    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Self {
        Self::new(downmix_to_mono(interleaved, channels), sample_rate)
    }

    /// Read a WAV file, downmixing to mono. Integer samples are scaled to
    /// -1.0..1.0.
    pub fn load(path: &Path) -> Result<Self, EditorError> {
        let mut reader = hound::WavReader::open(path).map_err(|e| EditorError::decode(path, e))?;
        let spec = reader.spec();
        let interleaved: Result<Vec<f32>, hound::Error> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect(),
            hound::SampleFormat::Int => {
                let full_scale = 2f32.powi(i32::from(spec.bits_per_sample.max(1)) - 1);
                reader.samples::<i32>().map(|s| s.map(|v| v as f32 / full_scale)).collect()
            }
        };
        let interleaved = interleaved.map_err(|e| EditorError::decode(path, e))?;
        let clip = Self::from_interleaved(&interleaved, usize::from(spec.channels), spec.sample_rate);
        crate::log_info!(
            "audio: loaded {} ({} ch, {} Hz, {:.2}s)",
            path.display(),
            spec.channels,
            spec.sample_rate,
            clip.duration_secs()
        );
        Ok(clip)
    }

    /// Write the clip as 16-bit mono PCM and clear the unsaved flag.
    pub fn save(&mut self, path: &Path) -> Result<(), EditorError> {
        if self.samples.is_empty() || self.sample_rate == 0 {
            return Err(EditorError::EmptyDocument);
        }
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let result = write_pcm16(&self.samples, path, spec);
        if let Err(e) = &result {
            crate::log_err!("audio: {}", e);
            return result;
        }
        self.unsaved_changes = false;
        crate::log_info!("audio: saved {}", path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn clipboard(&self) -> Option<&[f32]> {
        self.clipboard.as_deref()
    }

    pub fn unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    /// Call after the host has written the clip out.
    pub fn mark_saved(&mut self) {
        self.unsaved_changes = false;
    }

    /// Seconds to a sample index inside the clip.
    fn sample_index(&self, secs: f32) -> usize {
        let idx = (secs.max(0.0) * self.sample_rate as f32) as usize;
        idx.min(self.samples.len())
    }

    fn selection(&self, start_secs: f32, end_secs: f32) -> (usize, usize) {
        let a = self.sample_index(start_secs);
        let b = self.sample_index(end_secs);
        (a.min(b), a.max(b))
    }

    /// Move the selection into the clipboard.
    pub fn cut(&mut self, start_secs: f32, end_secs: f32) -> OpOutcome {
        let (start, end) = self.selection(start_secs, end_secs);
        if start == end {
            return OpOutcome::NoOp;
        }
        self.clipboard = Some(self.samples.drain(start..end).collect());
        self.unsaved_changes = true;
        OpOutcome::Applied
    }

    pub fn copy(&mut self, start_secs: f32, end_secs: f32) -> OpOutcome {
        let (start, end) = self.selection(start_secs, end_secs);
        if start == end {
            return OpOutcome::NoOp;
        }
        self.clipboard = Some(self.samples[start..end].to_vec());
        OpOutcome::Applied
    }

    /// Insert the clipboard at `position_secs`.
    pub fn paste(&mut self, position_secs: f32) -> OpOutcome {
        let Some(clip) = &self.clipboard else { return OpOutcome::NoOp };
        let at = self.sample_index(position_secs);
        self.samples.splice(at..at, clip.iter().copied());
        self.unsaved_changes = true;
        OpOutcome::Applied
    }

    /// Apply `effect` to the selection, or to the whole track when the
    /// selection is empty, then peak-normalize the processed range.
    pub fn apply_effect(&mut self, effect: AudioEffect, start_secs: f32, end_secs: f32) -> OpOutcome {
        if self.samples.is_empty() {
            return OpOutcome::NoOp;
        }
        let (mut start, mut end) = self.selection(start_secs, end_secs);
        if start == end {
            start = 0;
            end = self.samples.len();
        }
        let delay = ((self.sample_rate as f32 * REVERB_DELAY_SECS) as usize).max(1);
        let target = &mut self.samples[start..end];

        match effect {
            AudioEffect::Amplify => target.par_iter_mut().for_each(|s| *s *= AMPLIFY_GAIN),
            AudioEffect::NoiseGate => target.par_iter_mut().for_each(|s| {
                if s.abs() < NOISE_GATE_THRESHOLD {
                    *s = 0.0;
                }
            }),
            AudioEffect::Reverb => {
                // Walk backwards so every echo reads the dry signal.
                for i in (delay..target.len()).rev() {
                    target[i] += target[i - delay] * REVERB_DECAY;
                }
            }
            AudioEffect::Reverse => target.reverse(),
        }
        normalize_peak(target);
        self.unsaved_changes = true;
        OpOutcome::Applied
    }
}

fn write_pcm16(samples: &[f32], path: &Path, spec: hound::WavSpec) -> Result<(), EditorError> {
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| EditorError::encode(path, e))?;
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer.write_sample(v).map_err(|e| EditorError::encode(path, e))?;
    }
    writer.finalize().map_err(|e| EditorError::encode(path, e))
}
