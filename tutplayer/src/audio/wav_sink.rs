use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytemuck::Pod;
use hound::{WavSpec, WavWriter};
use tracing::{debug, info, warn};

use media_types::{AudioFormat, SampleFormat};

use super::AudioError;

type Writer = WavWriter<BufWriter<File>>;

/**
    A playback "device" that renders into a WAV file.

    Runs the fill callback on its own thread like a sound card would. With
    `realtime` set it sleeps one buffer's duration per callback, otherwise it
    pulls as fast as the callback returns.
*/
pub struct WavSink {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<u64, AudioError>>>,
}

impl WavSink {
    pub fn start<P, F>(
        path: P,
        format: AudioFormat,
        buffer_samples: usize,
        realtime: bool,
        fill: F,
    ) -> Result<Self, AudioError>
    where
        P: AsRef<Path>,
        F: FnMut(&mut [u8]) + Send + 'static,
    {
        let path = path.as_ref().to_path_buf();
        let (bits, kind) = match format.sample_format {
            SampleFormat::U8 => (8, hound::SampleFormat::Int),
            SampleFormat::S16 => (16, hound::SampleFormat::Int),
            SampleFormat::S32 => (32, hound::SampleFormat::Int),
            SampleFormat::F32 => (32, hound::SampleFormat::Float),
            other => return Err(AudioError::UnsupportedFormat(other)),
        };
        let spec = WavSpec {
            channels: format.channel_count(),
            sample_rate: format.sample_rate,
            bits_per_sample: bits,
            sample_format: kind,
        };
        let writer = WavWriter::create(&path, spec)?;

        let pump = Pump {
            samples: buffer_samples.max(1) * format.channel_count() as usize,
            period: realtime.then(|| {
                Duration::from_secs_f64(buffer_samples as f64 / format.sample_rate.max(1) as f64)
            }),
            stop: Arc::new(AtomicBool::new(false)),
        };
        let stop = Arc::clone(&pump.stop);
        let channels = format.channel_count() as u64;

        let handle = thread::Builder::new()
            .name("wav-sink".into())
            .spawn(move || {
                let samples = match format.sample_format {
                    // WAV 8-bit is unsigned; hound takes it centred on zero.
                    SampleFormat::U8 => pump.run(writer, fill, |s: u8| s.wrapping_sub(128) as i8),
                    SampleFormat::S16 => pump.run(writer, fill, |s: i16| s),
                    SampleFormat::S32 => pump.run(writer, fill, |s: i32| s),
                    _ => pump.run(writer, fill, |s: f32| s),
                }?;
                Ok(samples / channels.max(1))
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        info!(path = %path.display(), ?format, buffer_samples, realtime, "WAV sink started");

        Ok(Self {
            path,
            stop,
            handle: Some(handle),
        })
    }

    /**
        Stop pulling, finalize the file and return the number of frames
        written. Calling it again returns 0.
    */
    pub fn stop(&mut self) -> Result<u64, AudioError> {
        self.stop.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return Ok(0);
        };
        let frames = handle
            .join()
            .map_err(|_| AudioError::StreamError("WAV sink thread panicked".into()))??;
        debug!(path = %self.path.display(), frames, "WAV sink stopped");
        Ok(frames)
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "WAV sink did not shut down cleanly");
        }
    }
}

impl std::fmt::Debug for WavSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavSink")
            .field("path", &self.path)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

struct Pump {
    samples: usize,
    period: Option<Duration>,
    stop: Arc<AtomicBool>,
}

impl Pump {
    /**
        Pull buffers of `T` until stopped; returns samples written.

        The buffer is allocated as `T` and handed to the callback as bytes, so
        it is always aligned for the sample type.
    */
    fn run<T, S, F, C>(self, mut writer: Writer, mut fill: F, convert: C) -> Result<u64, AudioError>
    where
        T: Pod,
        S: hound::Sample,
        F: FnMut(&mut [u8]),
        C: Fn(T) -> S,
    {
        let mut buffer = vec![T::zeroed(); self.samples];
        let mut written = 0u64;

        while !self.stop.load(Ordering::Acquire) {
            fill(bytemuck::cast_slice_mut(&mut buffer));
            for &sample in &buffer {
                writer.write_sample(convert(sample))?;
            }
            written += buffer.len() as u64;

            if let Some(period) = self.period {
                thread::sleep(period);
            }
        }

        writer.finalize()?;
        Ok(written)
    }
}
