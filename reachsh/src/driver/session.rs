//! Session facade: one host, one shell, sequential dialogues.

use std::sync::Arc;

use log::{debug, info, warn};

use super::HostSession;
use super::dialogue::{DialogueContext, run_dialogue};
use super::interactive::DialogueSpec;
use super::prompt::{PromptState, detect_initial_prompt, set_custom_prompt};
use super::response::DialogueResult;
use crate::channel::PtyChannel;
use crate::cipher::Cipher;
use crate::config::SessionConfig;
use crate::error::{DialogueError, Error, Result};
use crate::results::ResultsLog;
use crate::transport::{ConnectStatus, Connector, SshTransport, authenticate};

/// Interactive shell session with one host.
///
/// Created unconnected; [`connect`](HostSession::connect) authenticates,
/// opens the shell and negotiates the prompt. Close it explicitly with
/// [`close`](HostSession::close); dropping an open session only logs a
/// warning and leaves teardown to the transport.
pub struct Session<C: Connector = SshTransport> {
    connector: C,
    config: Arc<SessionConfig>,
    cipher: Arc<Cipher>,
    results: Arc<dyn ResultsLog>,

    /// Shell channel, present while connected.
    channel: Option<PtyChannel<C::Stream>>,

    prompt_state: PromptState,

    /// Status of the last connection attempt.
    status: Option<ConnectStatus>,

    /// Whether the transport may hold a live connection.
    transport_up: bool,
}

impl Session<SshTransport> {
    /// Create an SSH session from a validated configuration.
    pub fn new(config: Arc<SessionConfig>, cipher: Arc<Cipher>, results: Arc<dyn ResultsLog>) -> Self {
        let transport = SshTransport::new(config.ssh().clone());
        Self::with_connector(transport, config, cipher, results)
    }
}

impl<C: Connector> Session<C> {
    /// Create a session over any connector.
    pub fn with_connector(
        connector: C,
        config: Arc<SessionConfig>,
        cipher: Arc<Cipher>,
        results: Arc<dyn ResultsLog>,
    ) -> Self {
        Self {
            connector,
            config,
            cipher,
            results,
            channel: None,
            prompt_state: PromptState::default(),
            status: None,
            transport_up: false,
        }
    }

    /// Host this session talks to.
    pub fn host(&self) -> &str {
        self.connector.host()
    }

    /// Status of the last connection attempt, if any.
    pub fn status(&self) -> Option<ConnectStatus> {
        self.status
    }

    /// Which completion regex is in force.
    pub fn prompt_state(&self) -> PromptState {
        self.prompt_state
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Switch to root with `sudo su -`.
    ///
    /// Only password-less sudo is supported; the custom prompt marker is
    /// re-injected afterwards.
    pub async fn switch_to_root(&mut self) -> Result<DialogueResult> {
        info!("Sudo switch to root user");
        self.run_dialogue(&DialogueSpec::new("sudo su -")).await
    }

    async fn establish(&mut self) -> std::result::Result<(), ConnectStatus> {
        let config = Arc::clone(&self.config);
        let timeouts = config.timeouts();

        self.transport_up = true;
        self.connector.connect().await.map_err(|e| {
            debug!("Connection to {} failed: {}", self.connector.host(), e);
            ConnectStatus::from(&e)
        })?;

        let method = authenticate(&mut self.connector, &config.ssh().credentials, timeouts.connect).await?;
        debug!("Authenticated with {:?}", method);

        let stream = self.connector.open_shell().await.map_err(|e| {
            debug!("Unable to open shell: {}", e);
            ConnectStatus::from(&e)
        })?;
        let mut channel = PtyChannel::new(stream, config.options().read_chunk_size);

        let prompts = config.prompts();
        if !detect_initial_prompt(&mut channel, &prompts.detection, timeouts.prompt_detection).await {
            return Err(ConnectStatus::PromptNotDetected);
        }

        self.prompt_state = PromptState::default();
        if config.options().set_custom_prompt {
            let (set, _) = set_custom_prompt(&mut channel, prompts, timeouts.prompt_set).await;
            self.prompt_state.set_custom_active(set);
        }

        self.channel = Some(channel);
        Ok(())
    }

    async fn teardown(&mut self) -> Result<()> {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.shutdown().await {
                debug!("Error shutting down shell: {}", e);
            }
        }
        if self.transport_up {
            self.transport_up = false;
            self.connector.disconnect().await?;
        }
        Ok(())
    }
}

impl<C: Connector> HostSession for Session<C> {
    async fn connect(&mut self) -> ConnectStatus {
        if self.channel.is_some() {
            return ConnectStatus::Connected;
        }

        info!("Processing host: {}", self.host());
        let status = match self.establish().await {
            Ok(()) => ConnectStatus::Connected,
            Err(status) => {
                if let Err(e) = self.teardown().await {
                    debug!("Error closing failed connection: {}", e);
                }
                self.results.write_line(status.message());
                status
            }
        };

        info!("{}: {}", self.host(), status);
        self.status = Some(status);
        status
    }

    async fn run_dialogue(&mut self, spec: &DialogueSpec) -> Result<DialogueResult> {
        spec.validate()?;
        let channel = self.channel.as_mut().ok_or(DialogueError::NotConnected)?;
        let ctx = DialogueContext {
            config: &self.config,
            cipher: &self.cipher,
            results: self.results.as_ref(),
        };

        let result = run_dialogue(channel, &mut self.prompt_state, &ctx, spec).await;
        if let Err(Error::Channel(e)) = &result {
            warn!("Shell on {} failed: {}", self.connector.host(), e);
            self.channel = None;
        }
        result
    }

    async fn close(&mut self) -> Result<()> {
        if self.channel.is_some() || self.transport_up {
            debug!("Closing session to {}", self.host());
        }
        self.teardown().await
    }

    fn is_open(&self) -> bool {
        self.channel.as_ref().is_some_and(PtyChannel::is_open)
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        if self.channel.is_some() || self.transport_up {
            warn!(
                "Session to {} dropped without close(); relying on transport teardown",
                self.connector.host()
            );
        }
    }
}
