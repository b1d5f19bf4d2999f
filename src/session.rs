//! One evaluation session: configuration, event application and the frozen result
//!
//! A session owns exactly one builder. The first structural fault poisons it;
//! later events are refused instead of being applied to a graph that no longer
//! matches the event stream.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::graph::{BuilderError, FileLocation, Metaprogram, MetaprogramBuilder, Mode};
use crate::ingest::{open_trace, read_events, Event, IngestError};
use std::path::Path;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: Mode,
    /// Show macro, include and directive frames in traversals
    pub preprocessor_mode: bool,
    /// Maximum number of frames recorded per evaluation
    pub trace_capacity: Option<usize>,
    /// Text of the synthetic root frame
    pub root_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Minimized,
            preprocessor_mode: false,
            trace_capacity: None,
            root_name: "<root>".to_string(),
        }
    }
}

/// Builds the metaprogram of a single evaluation
#[derive(Debug)]
pub struct Session {
    builder: MetaprogramBuilder,
    events: usize,
    fault: Option<BuilderError>,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        let builder = MetaprogramBuilder::new(config.mode, &config.root_name, FileLocation::default())
            .with_preprocessor_edges(config.preprocessor_mode)
            .with_trace_capacity(config.trace_capacity);
        Self {
            builder,
            events: 0,
            fault: None,
        }
    }

    /// Number of events applied so far
    pub fn events(&self) -> usize {
        self.events
    }

    pub fn metaprogram(&self) -> &Metaprogram {
        self.builder.metaprogram()
    }

    /// The structural fault that abandoned this session, if any
    pub fn fault(&self) -> Option<&BuilderError> {
        self.fault.as_ref()
    }

    pub fn apply(&mut self, event: Event) -> Result<()> {
        if let Some(fault) = &self.fault {
            bail!("session abandoned after structural fault: {}", fault);
        }
        let name = event.name();
        tracing::trace!(event = name, index = self.events, "apply");
        match event.apply(&mut self.builder) {
            Ok(()) => {
                self.events += 1;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(event = name, index = self.events, error = %e, "structural fault");
                self.fault = Some(e.clone());
                Err(anyhow::Error::new(e).context(format!("event #{} ({})", self.events + 1, name)))
            }
        }
    }

    /// The frozen metaprogram; fails unless evaluation end was applied
    pub fn finish(self) -> Result<Metaprogram> {
        if let Some(fault) = self.fault {
            return Err(anyhow::Error::new(fault).context("session abandoned"));
        }
        if !self.builder.metaprogram().is_frozen() {
            return Err(BuilderError::MissingEvaluationEnd {
                open: self.builder.open_edges(),
            }
            .into());
        }
        let mp = self.builder.into_metaprogram();
        tracing::debug!(
            vertices = mp.vertex_count(),
            edges = mp.edge_count(),
            mode = %mp.mode(),
            "session finished"
        );
        Ok(mp)
    }
}

/// Apply every event to a fresh session and return the frozen metaprogram
pub fn replay<I>(events: I, config: &SessionConfig) -> Result<Metaprogram>
where
    I: IntoIterator<Item = Result<Event, IngestError>>,
{
    let mut session = Session::new(config);
    for event in events {
        let event = event.context("failed to read trace")?;
        session.apply(event)?;
    }
    session.finish()
}

/// Replay a JSON-lines trace file (`-` for stdin)
pub fn load_trace(path: &Path, config: &SessionConfig) -> Result<Metaprogram> {
    let reader = open_trace(path)?;
    replay(read_events(reader), config)
        .with_context(|| format!("failed to replay trace {}", path.display()))
}
