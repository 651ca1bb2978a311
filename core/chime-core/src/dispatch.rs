//! Decision fan-out to the notification and sound sinks.
//!
//! Both sinks run per emitted decision and are joined with wait-for-all,
//! ignore-individual-failure semantics: a failing sound call must never
//! prevent or delay the visual notification, and vice versa. Failures are
//! logged at warn and swallowed; nothing here propagates.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::arbiter::{Classification, Decision};
use crate::config::NotifyConfig;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DispatchError(pub String);

/// Visual notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        message: &str,
        timeout_secs: u32,
        image: Option<&Path>,
        session_title: Option<&str>,
    ) -> Result<(), DispatchError>;
}

/// Sound sink.
#[async_trait]
pub trait SoundPlayer: Send + Sync {
    async fn play(
        &self,
        classification: Classification,
        sound_file: Option<&Path>,
        volume: u8,
    ) -> Result<(), DispatchError>;
}

pub struct Dispatcher {
    config: NotifyConfig,
    notifier: Arc<dyn Notifier>,
    sound: Arc<dyn SoundPlayer>,
}

impl Dispatcher {
    pub fn new(
        config: NotifyConfig,
        notifier: Arc<dyn Notifier>,
        sound: Arc<dyn SoundPlayer>,
    ) -> Self {
        Self {
            config,
            notifier,
            sound,
        }
    }

    pub async fn dispatch(&self, decision: &Decision) {
        let classification = decision.classification;
        let settings = self.config.events.for_classification(classification);
        let message = self
            .config
            .message_for(classification, &decision.session_title);

        let notify = async {
            if !settings.notify {
                return;
            }
            if let Err(err) = self
                .notifier
                .send(
                    &message,
                    self.config.global.timeout_seconds,
                    settings.image.as_deref(),
                    Some(&decision.session_title),
                )
                .await
            {
                tracing::warn!(
                    classification = classification.as_str(),
                    error = %err,
                    "Desktop notification failed"
                );
            }
        };

        let sound = async {
            if !settings.sound {
                return;
            }
            if let Err(err) = self
                .sound
                .play(
                    classification,
                    settings.sound_file.as_deref(),
                    self.config.global.volume,
                )
                .await
            {
                tracing::warn!(
                    classification = classification.as_str(),
                    error = %err,
                    "Sound playback failed"
                );
            }
        };

        tokio::join!(notify, sound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            message: &str,
            _timeout_secs: u32,
            _image: Option<&Path>,
            _session_title: Option<&str>,
        ) -> Result<(), DispatchError> {
            if let Ok(mut messages) = self.messages.lock() {
                messages.push(message.to_string());
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingSound {
        calls: Mutex<Vec<Classification>>,
    }

    #[async_trait]
    impl SoundPlayer for FailingSound {
        async fn play(
            &self,
            classification: Classification,
            _sound_file: Option<&Path>,
            _volume: u8,
        ) -> Result<(), DispatchError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(classification);
            }
            Err(DispatchError("no audio device".to_string()))
        }
    }

    fn decision(classification: Classification) -> Decision {
        Decision {
            classification,
            session_title: "Fix CI".to_string(),
        }
    }

    #[tokio::test]
    async fn failing_sound_never_blocks_the_notification() {
        let notifier = Arc::new(RecordingNotifier::default());
        let sound = Arc::new(FailingSound::default());
        let dispatcher = Dispatcher::new(NotifyConfig::default(), notifier.clone(), sound.clone());

        dispatcher.dispatch(&decision(Classification::Completion)).await;

        let messages = notifier.messages.lock().expect("messages");
        assert_eq!(messages.as_slice(), ["Fix CI finished its task"]);
        let calls = sound.calls.lock().expect("calls");
        assert_eq!(calls.as_slice(), [Classification::Completion]);
    }

    #[tokio::test]
    async fn disabled_classification_calls_no_sinks() {
        let notifier = Arc::new(RecordingNotifier::default());
        let sound = Arc::new(FailingSound::default());
        let mut config = NotifyConfig::default();
        config.events.error.notify = false;
        config.events.error.sound = false;
        let dispatcher = Dispatcher::new(config, notifier.clone(), sound.clone());

        dispatcher.dispatch(&decision(Classification::Error)).await;

        assert!(notifier.messages.lock().expect("messages").is_empty());
        assert!(sound.calls.lock().expect("calls").is_empty());
    }

    #[tokio::test]
    async fn custom_template_is_rendered() {
        let notifier = Arc::new(RecordingNotifier::default());
        let sound = Arc::new(FailingSound::default());
        let mut config = NotifyConfig::default();
        config.events.permission.message = Some("{title} needs you".to_string());
        config.events.permission.sound = false;
        let dispatcher = Dispatcher::new(config, notifier.clone(), sound);

        dispatcher.dispatch(&decision(Classification::Permission)).await;

        let messages = notifier.messages.lock().expect("messages");
        assert_eq!(messages.as_slice(), ["Fix CI needs you"]);
    }
}
