use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::catalog::{Catalog, MagicResolver};
use crate::config::{Config, FinalizePolicy};
use crate::descriptor::SessionDescriptor;
use crate::packet::{NoopPacketComposer, PacketComposer};
use crate::request::{
    read_request_list, RequestEntry, RequestResolutionEngine, ResolutionResult,
};
use crate::response::{
    truncate, ComposedResponse, ResponseComposer, ResponseDirective,
};
use crate::{FreqError, Result};

/// Session progress, only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SessionState {
    Start,
    DescriptorParsed,
    RequestsResolved,
    ResponseComposed,
    Finalized,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub results: Vec<(RequestEntry, ResolutionResult)>,
    pub directives: Vec<ResponseDirective>,
    /// Nothing was found and the default notice went out instead
    pub fallback: bool,
    pub state: SessionState,
    pub finalize_error: Option<String>,
}

impl SessionReport {
    pub fn fulfilled(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, result)| result.is_fulfilled())
            .count()
    }
}

/// One inbound file request, from descriptor to removed request list.
///
/// A `Session` answers exactly one descriptor; create a new one per
/// inbound session.
pub struct Session<'a> {
    config: &'a Config,
    packet_composer: Box<dyn PacketComposer + 'a>,
    state: SessionState,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            packet_composer: Box::new(NoopPacketComposer),
            state: SessionState::Start,
        }
    }

    pub fn with_packet_composer(
        mut self,
        composer: impl PacketComposer + 'a,
    ) -> Self {
        self.packet_composer = Box::new(composer);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Answer the session described by the SRIF at `path`
    pub fn run_file<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<SessionReport> {
        self.ensure_fresh()?;
        log::debug!("reading descriptor {}", path.as_ref().display());
        let descriptor = SessionDescriptor::load(path)?;
        self.run(descriptor)
    }

    /// Answer the session described by raw SRIF content
    pub fn run_str(&mut self, content: &str) -> Result<SessionReport> {
        self.ensure_fresh()?;
        let descriptor: SessionDescriptor = content.parse()?;
        self.run(descriptor)
    }

    pub fn run(
        &mut self,
        descriptor: SessionDescriptor,
    ) -> Result<SessionReport> {
        self.ensure_fresh()?;
        let config = self.config;
        self.advance(SessionState::DescriptorParsed);
        let session = descriptor.session_id.as_str();
        log::info!(
            "[{}] file request from {}",
            session,
            descriptor.sysop.as_deref().unwrap_or("unknown sysop")
        );

        let catalog = Catalog::load(
            config.magic_file.as_deref(),
            &config.file_areas,
        )?;
        let requests = read_request_list(session, &descriptor.request_list)?;
        let results = RequestResolutionEngine::new(
            session,
            MagicResolver::new(&catalog),
        )
        .check_exists(config.check_exists)
        .max_files(config.max_files)
        .resolve_all(&requests);
        self.advance(SessionState::RequestsResolved);

        let composer = ResponseComposer::new(session, &config.default_notice);
        let mut directives =
            composer.directives(results.iter().map(|(_, result)| result));
        let fallback = !results.iter().any(|(_, result)| result.is_fulfilled());
        let extra = self
            .packet_composer
            .compose(&descriptor, &results)
            .map_err(|e| FreqError::PacketComposeFailed {
                session: session.to_owned(),
                reason: e.to_string(),
            })?;
        directives.extend(extra);

        let composed = composer.append(&descriptor.response_list, directives)?;
        self.advance(SessionState::ResponseComposed);

        let finalize_error = self.finalize(&descriptor, &composed)?;

        Ok(SessionReport {
            session_id: descriptor.session_id.clone(),
            results,
            directives: composed.directives,
            fallback,
            state: self.state,
            finalize_error,
        })
    }

    /// Remove the consumed request list, applying the configured policy
    /// when that fails
    fn finalize(
        &mut self,
        descriptor: &SessionDescriptor,
        composed: &ComposedResponse,
    ) -> Result<Option<String>> {
        let session = descriptor.session_id.as_str();
        let source = match fs::remove_file(&descriptor.request_list) {
            Ok(()) => {
                log::debug!(
                    "[{}] removed {}",
                    session,
                    descriptor.request_list.display()
                );
                self.advance(SessionState::Finalized);
                return Ok(None);
            }
            Err(e) => e,
        };

        match self.config.finalize_policy {
            FinalizePolicy::LogAndContinue => {
                log::warn!(
                    "[{}] request list {} not removed, it may be answered again: {}",
                    session,
                    descriptor.request_list.display(),
                    source
                );
                Ok(Some(source.to_string()))
            }
            FinalizePolicy::Rollback => {
                log::error!(
                    "[{}] request list {} not removed, rolling back response",
                    session,
                    descriptor.request_list.display()
                );
                if let Err(e) = truncate(
                    &descriptor.response_list,
                    composed.previous_len,
                ) {
                    log::error!(
                        "[{}] rollback of {} failed: {}",
                        session,
                        descriptor.response_list.display(),
                        e
                    );
                }
                Err(FreqError::FinalizeFailed {
                    session: session.to_owned(),
                    path: descriptor.request_list.clone(),
                    source,
                })
            }
        }
    }

    fn ensure_fresh(&self) -> Result<()> {
        match self.state {
            SessionState::Start => Ok(()),
            state => Err(FreqError::SessionReused(state)),
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(next > self.state, "{:?} after {:?}", next, self.state);
        log::trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
