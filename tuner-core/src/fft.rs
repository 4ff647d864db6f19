//! # Fast Fourier Transform (FFT) Module
//!
//! Spectral analysis of one audio frame: a real-input FFT, its magnitude
//! spectrum, the matching frequency axis, and the dominant frequency.
//!
//! ## Notes
//! - Only the `N/2 + 1` non-negative bins of a length `N` frame are computed
//! - Rectangular window: no windowing, zero-padding or DC removal. Leakage
//!   between bins is accepted; a tone that sits exactly on a bin is reported
//!   exactly.
//! - Plans once per frame length and reuses its buffers every cycle

use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::config::SampleRateConfig;
use crate::error::AnalysisError;
use crate::frame::AudioFrame;

/// Frequencies of the non-negative bins of a real FFT of length `n`.
///
/// Bin `k` maps to `k * sample_rate / n`. For even `n` the last bin is the
/// Nyquist frequency and is reported as positive.
///
/// `k * sample_rate` outgrows an f32 mantissa at common rates, so the
/// product is formed in f64 and only the result is narrowed.
pub fn frequency_axis(n: usize, sample_rate: u32) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    (0..=n / 2)
        .map(|k| (k as f64 * sample_rate as f64 / n as f64) as f32)
        .collect()
}

/// Index of the largest magnitude. Ties go to the lowest index.
pub fn peak_bin(magnitudes: &[f32]) -> usize {
    let mut best = 0;
    for (i, &m) in magnitudes.iter().enumerate().skip(1) {
        if m > magnitudes[best] {
            best = i;
        }
    }
    best
}

/// Computes magnitude spectra and dominant frequencies of audio frames.
pub struct SpectralAnalyzer {
    planner: RealFftPlanner<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    sample_rate: u32,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    axis: Vec<f32>,
}

impl SpectralAnalyzer {
    pub fn new(rate: &SampleRateConfig) -> Self {
        Self::with_len(rate.chunk_size(), rate.sample_rate())
    }

    fn with_len(len: usize, sample_rate: u32) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(len);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        Self {
            planner,
            magnitudes: vec![0.0; spectrum.len()],
            axis: frequency_axis(len, sample_rate),
            fft,
            sample_rate,
            input,
            spectrum,
            scratch,
        }
    }

    /// Frame length the current plan is built for.
    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Frequency of every bin of the last computed spectrum.
    pub fn frequency_axis(&self) -> &[f32] {
        &self.axis
    }

    /// Magnitude of each non-negative frequency bin of `frame`.
    pub fn magnitude_spectrum(&mut self, frame: &AudioFrame) -> Result<&[f32], AnalysisError> {
        if frame.is_empty() {
            return Ok(&[]);
        }
        if frame.len() != self.len() {
            log::debug!(
                "Re-planning FFT for a {} sample frame (was {})",
                frame.len(),
                self.len()
            );
            self.replan(frame.len());
        }

        for (dst, &sample) in self.input.iter_mut().zip(frame.samples()) {
            *dst = sample as f32;
        }

        transform(
            self.fft.as_ref(),
            &mut self.input,
            &mut self.spectrum,
            &mut self.scratch,
            &mut self.magnitudes,
        )?;
        Ok(&self.magnitudes)
    }

    /// The frequency in Hz of the strongest bin of `frame`.
    ///
    /// A silent frame peaks at bin 0 and yields 0 Hz.
    pub fn dominant_frequency(&mut self, frame: &AudioFrame) -> Result<f32, AnalysisError> {
        if frame.is_empty() {
            return Ok(0.0);
        }
        let bin = peak_bin(self.magnitude_spectrum(frame)?);
        Ok(self.axis.get(bin).copied().unwrap_or(0.0))
    }

    fn replan(&mut self, len: usize) {
        self.fft = self.planner.plan_fft_forward(len);
        self.input = self.fft.make_input_vec();
        self.spectrum = self.fft.make_output_vec();
        self.scratch = self.fft.make_scratch_vec();
        self.magnitudes = vec![0.0; self.spectrum.len()];
        self.axis = frequency_axis(len, self.sample_rate);
    }
}

/// Runs the forward transform and writes the magnitude of every bin.
///
/// The buffers must have the lengths `fft` was planned for; otherwise the
/// transform is refused and `magnitudes` is left untouched.
fn transform(
    fft: &dyn RealToComplex<f32>,
    input: &mut [f32],
    spectrum: &mut [Complex<f32>],
    scratch: &mut [Complex<f32>],
    magnitudes: &mut [f32],
) -> Result<(), AnalysisError> {
    fft.process_with_scratch(input, spectrum, scratch)
        .map_err(|e| AnalysisError(e.to_string()))?;
    for (m, c) in magnitudes.iter_mut().zip(spectrum.iter()) {
        *m = c.norm();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_frame(freq: f32, rate: &SampleRateConfig) -> AudioFrame {
        let samples = (0..rate.chunk_size())
            .map(|i| {
                let t = i as f64 / rate.sample_rate() as f64;
                (10_000.0 * (2.0 * std::f64::consts::PI * freq as f64 * t).sin()).round() as i16
            })
            .collect();
        AudioFrame::from_samples(samples)
    }

    #[test]
    fn axis_covers_dc_to_nyquist() {
        let axis = frequency_axis(8, 8000);
        assert_eq!(axis, vec![0.0, 1000.0, 2000.0, 3000.0, 4000.0]);
        assert_eq!(frequency_axis(5, 5000).len(), 3);
        assert!(frequency_axis(0, 5000).is_empty());
    }

    #[test]
    fn peak_bin_prefers_first_maximum() {
        assert_eq!(peak_bin(&[1.0, 3.0, 2.0, 3.0]), 1);
        assert_eq!(peak_bin(&[0.0, 0.0, 0.0]), 0);
        assert_eq!(peak_bin(&[]), 0);
    }

    #[test]
    fn silence_is_zero_hz() {
        let rate = SampleRateConfig::default();
        let mut analyzer = SpectralAnalyzer::new(&rate);
        let frame = AudioFrame::from_samples(vec![0; rate.chunk_size()]);
        assert_eq!(analyzer.dominant_frequency(&frame).unwrap(), 0.0);
    }

    #[test]
    fn bin_aligned_tones_are_exact() {
        let rate = SampleRateConfig::default();
        let mut analyzer = SpectralAnalyzer::new(&rate);
        for freq in [10.0, 110.0, 330.0, 1_000.0, 12_340.0] {
            let frame = sine_frame(freq, &rate);
            assert_eq!(analyzer.dominant_frequency(&frame).unwrap(), freq);
        }
    }

    #[test]
    fn spectrum_has_half_plus_one_bins() {
        let rate = SampleRateConfig::new(8_000, 10).unwrap();
        let mut analyzer = SpectralAnalyzer::new(&rate);
        let frame = sine_frame(200.0, &rate);
        let magnitudes = analyzer.magnitude_spectrum(&frame).unwrap().to_vec();
        assert_eq!(magnitudes.len(), rate.chunk_size() / 2 + 1);
        assert_eq!(analyzer.frequency_axis().len(), magnitudes.len());
        assert_eq!(peak_bin(&magnitudes), 20);
    }

    #[test]
    fn replans_for_other_lengths() {
        let rate = SampleRateConfig::new(8_000, 10).unwrap();
        let mut analyzer = SpectralAnalyzer::new(&rate);

        let longer = SampleRateConfig::new(8_000, 5).unwrap();
        let frame = sine_frame(400.0, &longer);
        assert_eq!(analyzer.dominant_frequency(&frame).unwrap(), 400.0);
        assert_eq!(analyzer.len(), longer.chunk_size());

        let empty = AudioFrame::from_samples(Vec::new());
        assert_eq!(analyzer.dominant_frequency(&empty).unwrap(), 0.0);
    }

    #[test]
    fn axis_is_exact_at_44_1_khz() {
        let rate = SampleRateConfig::new(44_100, 10).unwrap();
        let axis = frequency_axis(rate.chunk_size(), rate.sample_rate());
        for (k, &hz) in axis.iter().enumerate() {
            assert_eq!(hz, (k * 10) as f32, "bin {}", k);
        }
    }

    #[test]
    fn bin_aligned_tones_are_exact_at_44_1_khz() {
        let rate = SampleRateConfig::new(44_100, 10).unwrap();
        let mut analyzer = SpectralAnalyzer::new(&rate);
        for freq in [82.0, 15_230.0, 15_250.0, 15_270.0] {
            let frame = sine_frame(freq, &rate);
            assert_eq!(analyzer.dominant_frequency(&frame).unwrap(), freq);
        }
    }

    #[test]
    fn mismatched_buffers_are_an_error() {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(16);
        let mut input = fft.make_input_vec();
        let mut spectrum = vec![Complex::new(0.0, 0.0); 3];
        let mut scratch = fft.make_scratch_vec();
        let mut magnitudes = vec![1.0; 3];

        let err = transform(
            fft.as_ref(),
            &mut input,
            &mut spectrum,
            &mut scratch,
            &mut magnitudes,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("spectral analysis failed"));
        assert_eq!(magnitudes, vec![1.0; 3]);
    }
}
