//! The talk-box engine: per-sample synthesis and per-block LPC analysis.
//!
//! [`TalkBox::new`] returns the two halves of one engine instance. The
//! [`TalkBox`] half belongs on the audio thread: it gain-stages the carrier,
//! runs it through the all-pole filter and collects modulator samples into
//! analysis blocks. The [`LpcAnalyzer`] half belongs on a worker thread: it
//! consumes finished blocks and re-estimates the spectral envelope, then
//! publishes fresh prediction coefficients under a short lock.
//!
//! The only blocking point on the audio thread is the coefficient mutex,
//! which the analyzer holds just long enough to copy one coefficient vector.
//! Gains cross the thread boundary as plain 32-bit atomics.

mod exchange;

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::constants::{
    ACF_AVG_SHIFT, BLOCK_LENGTH, DEFAULT_PREEMPHASIS_HZ, DEFAULT_SMOOTHING_TIME,
    FRACTIONAL_DIGITS, K_MAX, MEMORY_RMS_SIZE, NUM_ACF, N_SHIFT_BLOCK, N_SHIFT_MEMORY, ORDER,
    Q31_ONE,
};
use crate::dsp::{autocorrelate, durbin, filter_one, HighPass};
use crate::error::{Result, TalkBoxError};
use crate::math::{exp_fixed, log_fixed, E_LOG, L_LOG};
use crate::types::{Word32, Word64};

use exchange::{block_exchange, BlockReader, BlockWriter, PushOutcome};

/// Coefficient vector and filter delay line, guarded together so the filter
/// never runs against a half-published vector.
struct FilterState {
    a: [Word32; ORDER],
    memory_lpc: [Word32; ORDER],
}

struct Shared {
    sample_rate: f64,
    filter: Mutex<FilterState>,
    /// Voice envelope gain, Q1.31. Written by the analyzer, read per sample.
    voice_rms: AtomicI32,
    /// Prediction error gain, Q1.31. Written by the analyzer, read per sample.
    error_gain: AtomicI32,
    /// Gate threshold on the voice envelope, Q1.31.
    gate_level: AtomicI32,
    /// Allpass coefficient of the pre-emphasis high-pass, Q1.31.
    high_pass_coeff: AtomicI32,
    /// ACF smoothing weights, Q1.31; history and new-block shares sum to one.
    acf_alpha0: AtomicI32,
    acf_alpha1: AtomicI32,
    /// Count of analysis blocks dropped because the analyzer fell behind.
    overruns: AtomicU32,
    /// Tells the analyzer to clear its thread-local state on the next call.
    reset_pending: AtomicBool,
}

/// Audio-thread half of the engine.
///
/// Owns the per-sample entry point [`process`](TalkBox::process) and the
/// whole parameter/meter surface. Create with [`TalkBox::new`], move the
/// returned [`LpcAnalyzer`] to a worker thread.
pub struct TalkBox {
    shared: Arc<Shared>,
    writer: BlockWriter,
}

/// Analysis-thread half of the engine.
///
/// Call [`calculate_lpc_coefficients`](LpcAnalyzer::calculate_lpc_coefficients)
/// in a loop at a rate comparable to block completion; the call returns
/// immediately when no block is waiting.
pub struct LpcAnalyzer {
    shared: Arc<Shared>,
    reader: BlockReader,
    high_pass: HighPass,
    memory_rms: [Word32; MEMORY_RMS_SIZE],
    acf_ring: [[Word32; ORDER + 1]; NUM_ACF],
    acf_smooth: [Word32; ORDER + 1],
    acf_index: usize,
    a_tmp: [Word32; ORDER],
}

impl TalkBox {
    /// Builds one engine instance for the given sample rate and splits it
    /// into its audio-thread and analysis-thread halves.
    ///
    /// Defaults: 30 ms envelope smoothing, gate off, 20 kHz pre-emphasis
    /// cutoff (clamped below Nyquist at low sample rates).
    ///
    /// # Errors
    ///
    /// [`TalkBoxError::InvalidSampleRate`] when `sample_rate` is not a
    /// finite positive number.
    pub fn new(sample_rate: f64) -> Result<(TalkBox, LpcAnalyzer)> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(TalkBoxError::InvalidSampleRate { rate: sample_rate });
        }

        let (writer, reader) = block_exchange();
        let shared = Arc::new(Shared {
            sample_rate,
            filter: Mutex::new(FilterState {
                a: [0; ORDER],
                memory_lpc: [0; ORDER],
            }),
            voice_rms: AtomicI32::new(0),
            error_gain: AtomicI32::new(0),
            gate_level: AtomicI32::new(0),
            high_pass_coeff: AtomicI32::new(0),
            acf_alpha0: AtomicI32::new(0),
            acf_alpha1: AtomicI32::new(0),
            overruns: AtomicU32::new(0),
            reset_pending: AtomicBool::new(false),
        });

        let talkbox = TalkBox {
            shared: Arc::clone(&shared),
            writer,
        };
        talkbox.set_smoothing_time(DEFAULT_SMOOTHING_TIME);
        talkbox.set_gate_level(0.0);
        talkbox.set_preemphasis(DEFAULT_PREEMPHASIS_HZ);

        let analyzer = LpcAnalyzer {
            shared,
            reader,
            high_pass: HighPass::new(),
            memory_rms: [0; MEMORY_RMS_SIZE],
            acf_ring: [[0; ORDER + 1]; NUM_ACF],
            acf_smooth: [0; ORDER + 1],
            acf_index: 0,
            a_tmp: [0; ORDER],
        };

        debug!(sample_rate, order = ORDER, block_length = BLOCK_LENGTH, "talk-box engine created");
        Ok((talkbox, analyzer))
    }

    /// Processes one sample pair: `samples[0]` is the carrier (rewritten in
    /// place with the vocoded output), `samples[1]` the modulator (read
    /// only).
    ///
    /// Real-time safe: no allocation, and the only lock held is the
    /// coefficient mutex for the duration of one filter step.
    pub fn process(&mut self, samples: &mut [Word32; 2]) {
        let error_gain = self.shared.error_gain.load(Ordering::Relaxed);
        let voice_rms = self.shared.voice_rms.load(Ordering::Relaxed);

        // carrier * error_gain * voice_rms, Q1.31 each
        let mut y = ((error_gain as Word64 * samples[0] as Word64) >> 31) as Word32;
        y = ((voice_rms as Word64 * y as Word64) >> 31) as Word32;

        {
            let mut filter = self.shared.filter.lock();
            let FilterState { a, memory_lpc } = &mut *filter;
            samples[0] = filter_one(y, a.as_slice(), memory_lpc.as_mut_slice(), FRACTIONAL_DIGITS);
        }

        if self.writer.push(samples[1]) == PushOutcome::Overrun {
            let dropped = self.shared.overruns.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(total_dropped = dropped, "timing error: analysis thread fell behind, block dropped");
        }
    }

    /// Frame-granular convenience over [`process`](TalkBox::process).
    ///
    /// `carrier` is rewritten in place; processing stops at the shorter of
    /// the two slices.
    pub fn process_frame(&mut self, carrier: &mut [Word32], modulator: &[Word32]) {
        for (c, &m) in carrier.iter_mut().zip(modulator.iter()) {
            let mut pair = [*c, m];
            self.process(&mut pair);
            *c = pair[0];
        }
    }

    /// Sets the ACF smoothing time constant in seconds.
    ///
    /// Non-positive values (and values shorter than one block) disable
    /// smoothing: the newest averaged ACF is used as-is.
    pub fn set_smoothing_time(&self, tau_seconds: f64) {
        let alpha = if tau_seconds > 0.0 {
            (1.0 - BLOCK_LENGTH as f64 / (tau_seconds * self.shared.sample_rate)).max(0.0)
        } else {
            0.0
        };
        self.shared
            .acf_alpha0
            .store((alpha * Q31_ONE as f64) as i32, Ordering::Relaxed);
        self.shared
            .acf_alpha1
            .store(((1.0 - alpha) * Q31_ONE as f64) as i32, Ordering::Relaxed);
    }

    /// Sets the gate threshold on the voice envelope, 0.0..=1.0.
    /// Out-of-range values are clamped.
    pub fn set_gate_level(&self, level: f64) {
        let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
        self.shared
            .gate_level
            .store((level * Q31_ONE as f64) as i32, Ordering::Relaxed);
    }

    /// Sets the pre-emphasis cutoff in Hz. The cutoff is clamped to
    /// `[0, fs/2)`; at 0 the section degenerates to a pass-through.
    pub fn set_preemphasis(&self, cutoff_hz: f64) {
        let fs = self.shared.sample_rate;
        let cutoff = if cutoff_hz.is_finite() { cutoff_hz.clamp(0.0, 0.499 * fs) } else { 0.0 };
        let ftan = (std::f64::consts::PI * cutoff / fs).tan();
        let coeff = ((ftan - 1.0) / (ftan + 1.0) * Q31_ONE as f64) as i32;
        self.shared.high_pass_coeff.store(coeff, Ordering::Relaxed);
    }

    /// Number of prediction coefficients of the all-pole model.
    pub fn num_coeffs(&self) -> usize {
        ORDER
    }

    /// Copies the current prediction coefficients as floats; fills the
    /// shorter of `out` and the coefficient vector.
    pub fn coefficients(&self, out: &mut [f32]) {
        let filter = self.shared.filter.lock();
        let scale = (1u32 << FRACTIONAL_DIGITS) as f32;
        for (dst, &src) in out.iter_mut().zip(filter.a.iter()) {
            *dst = src as f32 / scale;
        }
    }

    /// Current pre-emphasis allpass coefficient as a float in [-1, 1).
    pub fn preemphasis(&self) -> f32 {
        self.shared.high_pass_coeff.load(Ordering::Relaxed) as f32 / Q31_ONE as f32
    }

    /// Prediction error gain applied to the carrier, 0.0..=1.0.
    pub fn error_gain(&self) -> f32 {
        self.shared.error_gain.load(Ordering::Relaxed) as f32 / Q31_ONE as f32
    }

    /// Gated voice envelope applied to the carrier, 0.0..=1.0.
    pub fn voice_gain(&self) -> f32 {
        self.shared.voice_rms.load(Ordering::Relaxed) as f32 / Q31_ONE as f32
    }

    /// ACF smoothing weights (history, new) in Q1.31.
    pub fn smoothing_alphas(&self) -> (i32, i32) {
        (
            self.shared.acf_alpha0.load(Ordering::Relaxed),
            self.shared.acf_alpha1.load(Ordering::Relaxed),
        )
    }

    /// Number of analysis blocks dropped so far because the analyzer did not
    /// keep up with block production.
    pub fn overrun_count(&self) -> u32 {
        self.shared.overruns.load(Ordering::Relaxed)
    }

    /// Sample rate this instance was built for, Hz.
    pub fn sample_rate(&self) -> f64 {
        self.shared.sample_rate
    }

    /// Zeroes all runtime state: buffers, delay lines, coefficient vector,
    /// gains, meters and the block rendezvous. Parameters (smoothing, gate,
    /// pre-emphasis) are kept.
    ///
    /// The analyzer half clears its own accumulators at the top of its next
    /// call.
    pub fn reset_states(&mut self) {
        {
            let mut filter = self.shared.filter.lock();
            filter.a = [0; ORDER];
            filter.memory_lpc = [0; ORDER];
        }
        self.shared.voice_rms.store(0, Ordering::Relaxed);
        self.shared.error_gain.store(0, Ordering::Relaxed);
        self.shared.overruns.store(0, Ordering::Relaxed);
        self.writer.reset();
        self.shared.reset_pending.store(true, Ordering::Release);
        debug!("engine state reset");
    }
}

impl LpcAnalyzer {
    /// Consumes the pending analysis block, if any, and republishes the
    /// prediction model.
    ///
    /// Runs the whole heavy path: envelope and gate, pre-emphasis,
    /// autocorrelation with ring averaging and smoothing, the Durbin
    /// recursion and the gain computation. Returns immediately when no block
    /// is waiting. Intended to be called repeatedly from a non-audio thread.
    pub fn calculate_lpc_coefficients(&mut self) {
        if self.shared.reset_pending.swap(false, Ordering::AcqRel) {
            self.clear_states();
        }

        let hp_coeff = self.shared.high_pass_coeff.load(Ordering::Relaxed);
        let slot = self.acf_index;

        let high_pass = &mut self.high_pass;
        let acf_slot = &mut self.acf_ring[slot];
        let consumed = self.reader.consume(|block| {
            // per-block mean absolute amplitude, then pre-emphasis in place
            let mut abs_voice: Word64 = 0;
            for sample in block.iter_mut() {
                abs_voice += (*sample as Word64).abs() >> N_SHIFT_BLOCK;
                *sample = high_pass.process(*sample, hp_coeff);
            }
            autocorrelate(acf_slot.as_mut_slice(), block.as_mut_slice());
            abs_voice.min(Q31_ONE as Word64) as Word32
        });
        let Some(abs_voice) = consumed else {
            return;
        };

        // FIR envelope integrator over the last few blocks
        self.memory_rms.copy_within(..MEMORY_RMS_SIZE - 1, 1);
        self.memory_rms[0] = abs_voice;

        let mut rms: Word64 = 0;
        for &m in &self.memory_rms {
            rms += (m as Word64) >> N_SHIFT_MEMORY;
        }
        // two bits of make-up gain, saturating at full scale
        let mut voice_rms = if rms < 1 << 29 { (rms << 2) as Word32 } else { Q31_ONE };

        if voice_rms < self.shared.gate_level.load(Ordering::Relaxed) {
            voice_rms = 0;
        }

        // moving average across the ACF ring, written back into the slot
        let mut averaged = [0; ORDER + 1];
        for i in 0..=ORDER {
            let mut sum = 0;
            for ring in &self.acf_ring {
                sum += ring[i] >> ACF_AVG_SHIFT;
            }
            averaged[i] = sum;
        }
        self.acf_ring[slot] = averaged;

        // first-order smoothing in the autocorrelation domain; smoothing the
        // coefficients themselves would not preserve stability
        let alpha0 = self.shared.acf_alpha0.load(Ordering::Relaxed) as Word64;
        let alpha1 = self.shared.acf_alpha1.load(Ordering::Relaxed) as Word64;
        for i in 0..=ORDER {
            let s = (self.acf_smooth[i] as Word64 * alpha0 + averaged[i] as Word64 * alpha1) >> 31;
            self.acf_smooth[i] = s as Word32;
        }

        if voice_rms > 0 {
            let error_power = durbin(&self.acf_smooth, &mut self.a_tmp, FRACTIONAL_DIGITS, K_MAX);

            // error_gain = sqrt(error_power): halving the log takes the root
            let error_gain = if error_power > 0 {
                exp_fixed(log_fixed(error_power, L_LOG) >> 1, E_LOG)
            } else {
                0
            };
            self.shared.error_gain.store(error_gain, Ordering::Relaxed);

            let mut filter = self.shared.filter.lock();
            filter.a.copy_from_slice(&self.a_tmp);
        } else {
            self.shared.error_gain.store(0, Ordering::Relaxed);
        }

        self.shared.voice_rms.store(voice_rms, Ordering::Relaxed);

        self.acf_index = (self.acf_index + 1) % NUM_ACF;
    }

    /// True when a finished block is waiting for analysis.
    pub fn has_pending_block(&self) -> bool {
        self.reader.pending()
    }

    fn clear_states(&mut self) {
        self.high_pass.reset();
        self.memory_rms = [0; MEMORY_RMS_SIZE];
        self.acf_ring = [[0; ORDER + 1]; NUM_ACF];
        self.acf_smooth = [0; ORDER + 1];
        self.acf_index = 0;
        self.a_tmp = [0; ORDER];
    }
}
