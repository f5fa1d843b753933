//! Reconciles asynchronous generator results against the latest viewport.
//!
//! The [`ChunkLifecycleManager`] is the sole owner of chunk render handles.
//! Generator responses may arrive in any order relative to newer requests;
//! every [`ChunkEvent`] is folded into a per-coordinate [`ChunkState`] so the
//! visible set always reflects the most recently expressed intent.
//!
//! ```text
//!   state \ input     add                 remove              viewport enters
//!   ---------------   -----------------   -----------------   ---------------
//!   (absent)          Visible             Pending{true}       Pending{false}
//!   Pending{false}    Visible             Pending{true}       Pending{false}
//!   Pending{true}     Removed (stale)     Pending{true}       Pending{true}
//!   Visible           Visible (dup)       Removed             Visible
//!   Removed           Visible             Pending{true}       Pending{false}
//! ```
//!
//! `add` builds and shows a handle only when the result is `Visible` from a
//! non-visible state; `remove` hides and releases only from `Visible`.

use crossbeam_channel::Sender;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::coords::{ChunkCoordinate, Viewport};
use crate::events::{ChunkEvent, ChunkEventKind, GeneratorRequest};
use crate::geometry::ChunkGeometry;

/// Errors raised while issuing generator requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The generator's request channel is closed.
    #[error("chunk generator has shut down")]
    GeneratorClosed,
}

/// The render side of chunk handles.
///
/// Implemented by whatever turns geometry into something displayable. The
/// manager calls into it; it never calls back.
pub trait ChunkRenderer {
    /// Opaque render resource for one chunk.
    type Handle;

    /// Construct a resource from generated geometry.
    fn build(&mut self, geometry: &ChunkGeometry) -> Self::Handle;

    /// Make a built resource visible.
    fn show(&mut self, handle: &Self::Handle);

    /// Retract a visible resource.
    fn hide(&mut self, handle: &Self::Handle);

    /// Free a resource. It is never used again afterwards.
    fn release(&mut self, handle: Self::Handle);
}

/// Lifecycle state of one chunk. A coordinate with no record is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkState<H> {
    /// No renderable yet. `removal_requested` means a remove arrived first and
    /// the next add for this coordinate is stale.
    Pending {
        /// An unload is outstanding for a chunk that has not arrived.
        removal_requested: bool,
    },
    /// Built and published; the manager owns the handle.
    Visible(H),
    /// Retracted and released. Kept to absorb late messages.
    Removed,
}

/// Per-coordinate bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord<H> {
    /// Which chunk this record tracks.
    pub coordinate: ChunkCoordinate,
    /// Current lifecycle state.
    pub state: ChunkState<H>,
}

impl<H> ChunkRecord<H> {
    fn new(coordinate: ChunkCoordinate) -> Self {
        Self {
            coordinate,
            state: ChunkState::Pending {
                removal_requested: false,
            },
        }
    }

    /// The render handle, if the chunk is visible.
    pub fn render_handle(&self) -> Option<&H> {
        match &self.state {
            ChunkState::Visible(handle) => Some(handle),
            _ => None,
        }
    }

    /// Whether a renderable exists for this chunk.
    pub fn has_renderable(&self) -> bool {
        matches!(self.state, ChunkState::Visible(_))
    }

    /// Whether an unload is waiting for an add that has not arrived.
    pub fn pending_removal(&self) -> bool {
        matches!(
            self.state,
            ChunkState::Pending {
                removal_requested: true
            }
        )
    }
}

/// Owns every [`ChunkRecord`] and the render handles they hold.
pub struct ChunkLifecycleManager<R: ChunkRenderer> {
    renderer: R,
    records: FxHashMap<ChunkCoordinate, ChunkRecord<R::Handle>>,
    requests: Sender<GeneratorRequest>,
    viewport: Option<Viewport>,
}

impl<R: ChunkRenderer> ChunkLifecycleManager<R> {
    /// Creates a manager that sends requests through `requests`.
    pub fn new(renderer: R, requests: Sender<GeneratorRequest>) -> Self {
        Self {
            renderer,
            records: FxHashMap::default(),
            requests,
            viewport: None,
        }
    }

    /// Issues the initial load for `viewport`.
    ///
    /// If a viewport is already being served this behaves like
    /// [`set_viewport`](Self::set_viewport).
    pub fn bootstrap(&mut self, viewport: Viewport) -> Result<(), LifecycleError> {
        self.set_viewport(viewport.center, viewport.render_distance)
            .map(|_| ())
    }

    /// Moves the viewport. Returns `Ok(false)` without sending anything when
    /// neither the center nor the render distance changed.
    pub fn set_viewport(
        &mut self,
        center: ChunkCoordinate,
        render_distance: u32,
    ) -> Result<bool, LifecycleError> {
        let new = Viewport::new(center, render_distance);
        let (request, entering) = match self.viewport {
            Some(old) if old == new => return Ok(false),
            Some(old) => (
                GeneratorRequest::UpdateRange { old, new },
                new.difference(&old),
            ),
            None => (GeneratorRequest::Load(new), new.coordinates()),
        };

        self.requests
            .send(request)
            .map_err(|_| LifecycleError::GeneratorClosed)?;
        debug!(
            "Viewport now {} (render distance {}), {} chunks requested",
            center,
            render_distance,
            entering.len()
        );

        for coordinate in entering {
            let record = self
                .records
                .entry(coordinate)
                .or_insert_with(|| ChunkRecord::new(coordinate));
            // A pending removal must survive: its stale add is still in flight.
            if matches!(record.state, ChunkState::Removed) {
                record.state = ChunkState::Pending {
                    removal_requested: false,
                };
            }
        }

        self.viewport = Some(new);
        Ok(true)
    }

    /// Folds one generator response into the chunk's state.
    pub fn on_generator_event(&mut self, event: ChunkEvent) {
        let coordinate = event.coordinate;
        let record = self
            .records
            .entry(coordinate)
            .or_insert_with(|| ChunkRecord::new(coordinate));
        let previous = std::mem::replace(&mut record.state, ChunkState::Removed);

        record.state = match (event.kind, previous) {
            (
                ChunkEventKind::Add(_),
                ChunkState::Pending {
                    removal_requested: true,
                },
            ) => {
                debug!("Dropped stale add for chunk {}", coordinate);
                ChunkState::Removed
            }
            (ChunkEventKind::Add(_), ChunkState::Visible(handle)) => {
                debug!("Ignored duplicate add for visible chunk {}", coordinate);
                ChunkState::Visible(handle)
            }
            (ChunkEventKind::Add(geometry), _) => {
                debug_assert_eq!(geometry.coordinate, coordinate);
                let handle = self.renderer.build(&geometry);
                self.renderer.show(&handle);
                trace!("Chunk {} visible", coordinate);
                ChunkState::Visible(handle)
            }
            (ChunkEventKind::Remove, ChunkState::Visible(handle)) => {
                self.renderer.hide(&handle);
                self.renderer.release(handle);
                trace!("Chunk {} removed", coordinate);
                ChunkState::Removed
            }
            (ChunkEventKind::Remove, _) => ChunkState::Pending {
                removal_requested: true,
            },
        };

        debug_assert!(
            !(record.has_renderable() && record.pending_removal()),
            "chunk {coordinate} is both visible and pending removal"
        );
    }

    /// Hides and releases every visible chunk, forgets all records and the
    /// current viewport. The next [`set_viewport`](Self::set_viewport) loads
    /// from scratch.
    pub fn reset(&mut self) {
        let mut released = 0usize;
        for (_, record) in self.records.drain() {
            if let ChunkState::Visible(handle) = record.state {
                self.renderer.hide(&handle);
                self.renderer.release(handle);
                released += 1;
            }
        }
        self.viewport = None;
        debug!("Chunk lifecycle reset, released {} chunks", released);
    }

    /// Points the manager at a different generator. Call [`reset`](Self::reset)
    /// first if the old generator's chunks should not survive.
    pub fn replace_generator(&mut self, requests: Sender<GeneratorRequest>) {
        self.requests = requests;
    }

    /// Whether `coordinate` is currently published.
    pub fn is_visible(&self, coordinate: ChunkCoordinate) -> bool {
        self.records
            .get(&coordinate)
            .is_some_and(ChunkRecord::has_renderable)
    }

    /// Every visible coordinate, in no particular order.
    pub fn visible(&self) -> impl Iterator<Item = ChunkCoordinate> + '_ {
        self.records
            .values()
            .filter(|r| r.has_renderable())
            .map(|r| r.coordinate)
    }

    /// Number of visible chunks.
    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    /// State of `coordinate`, or `None` if no record exists.
    pub fn state(&self, coordinate: ChunkCoordinate) -> Option<&ChunkState<R::Handle>> {
        self.records.get(&coordinate).map(|r| &r.state)
    }

    /// Number of retained records, including removed ones.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// The viewport last sent to the generator.
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Shared access to the renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Mutable access to the renderer.
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
