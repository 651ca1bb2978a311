//! Sound playback for emitted decisions.
//!
//! Absolute paths are used directly; relative names are resolved against
//! the chime sounds directory, and each classification has a default file
//! there. Decoding and playback run on a blocking task so the audio stack
//! never stalls the event loop.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chime_core::{Classification, DispatchError, SoundPlayer};

pub struct RodioPlayer;

fn sounds_dir() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("chime").join("sounds")
    } else {
        PathBuf::from("sounds")
    }
}

fn default_sound_name(classification: Classification) -> &'static str {
    match classification {
        Classification::Permission => "permission.wav",
        Classification::Completion => "complete.wav",
        Classification::DelegatedCompletion => "delegated.wav",
        Classification::Error => "error.wav",
    }
}

fn resolve_sound_path(classification: Classification, sound_file: Option<&Path>) -> PathBuf {
    match sound_file {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => sounds_dir().join(path),
        None => sounds_dir().join(default_sound_name(classification)),
    }
}

#[async_trait]
impl SoundPlayer for RodioPlayer {
    async fn play(
        &self,
        classification: Classification,
        sound_file: Option<&Path>,
        volume: u8,
    ) -> Result<(), DispatchError> {
        if volume == 0 {
            return Ok(());
        }

        let path = resolve_sound_path(classification, sound_file);
        if !path.exists() {
            return Err(DispatchError(format!(
                "sound file not found: {}",
                path.display()
            )));
        }

        let volume_f32 = (volume.min(100) as f32 / 100.0).clamp(0.0, 1.0);

        tokio::task::spawn_blocking(move || -> Result<(), DispatchError> {
            let file = std::fs::File::open(&path)
                .map_err(|err| DispatchError(format!("failed to open {}: {}", path.display(), err)))?;
            let stream = rodio::DeviceSinkBuilder::open_default_sink()
                .map_err(|err| DispatchError(format!("failed to open audio output: {}", err)))?;
            let player = rodio::Player::connect_new(stream.mixer());
            let source = rodio::Decoder::new(BufReader::new(file))
                .map_err(|err| DispatchError(format!("failed to decode {}: {}", path.display(), err)))?;
            player.set_volume(volume_f32);
            player.append(source);
            player.sleep_until_end();
            Ok(())
        })
        .await
        .map_err(|err| DispatchError(format!("sound task failed: {}", err)))?
    }
}
