use std::{
    ops::Deref as _,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

use image::{GenericImage, GenericImageView, RgbaImage};

use crate::{
    camera::Camera,
    geometry::ScreenBlock,
    renderer::{Environment, Progress, RenderCounters, RenderSettings, worker::Worker},
    scene::Scene,
    screen_block::ScreenBlockExt,
};

/// Starts rendering the scene on all CPU cores and returns immediately.
///
/// `started_tile_callback` and `finished_tile_callback` are called from the worker threads.
pub fn render<F1, F2>(
    scene: Arc<Scene>,
    environment: Environment,
    camera: Camera,
    settings: RenderSettings,
    started_tile_callback: F1,
    finished_tile_callback: F2,
) -> anyhow::Result<RenderProgress>
where
    F1: Fn(ScreenBlock) + Send + Sync + 'static,
    F2: Fn(ScreenBlock, Progress) + Send + Sync + 'static,
{
    let resolution = camera.resolution();
    let image = RgbaImage::new(resolution.x, resolution.y);
    let state = Arc::new(RenderState {
        scene,
        environment,
        camera,
        settings,

        image: Mutex::new(image),

        tile_ordering: ScreenBlock::with_size(&resolution).tile_ordering(settings.tile_size),
        next_tile_index: AtomicUsize::new(0),
        finished_tiles: AtomicUsize::new(0),

        counters: Mutex::new(RenderCounters::default()),
    });
    let started_tile_callback = Arc::new(started_tile_callback);
    let finished_tile_callback = Arc::new(finished_tile_callback);

    // Pin workers to cores where the platform lets us enumerate them
    let cores: Vec<_> = match core_affinity::get_core_ids() {
        Some(ids) if !ids.is_empty() => ids.into_iter().map(Some).collect(),
        _ => {
            log::debug!("Core list not available, not pinning worker threads");
            vec![None; num_cpus::get()]
        }
    };
    log::info!(
        "Rendering {}x{} pixels in {} tiles on {} threads",
        resolution.x,
        resolution.y,
        state.tile_ordering.len(),
        cores.len()
    );

    let threads = cores
        .into_iter()
        .enumerate()
        .map(|(worker_id, core)| {
            let state = Arc::clone(&state);
            let started_tile_callback = Arc::clone(&started_tile_callback);
            let finished_tile_callback = Arc::clone(&finished_tile_callback);

            thread::Builder::new()
                .name(format!("worker{worker_id}"))
                .spawn(move || {
                    if let Some(core) = core {
                        core_affinity::set_for_current(core);
                    }

                    let mut worker = Worker::new(worker_id);
                    let mut buffer =
                        RgbaImage::new(settings.tile_size.into(), settings.tile_size.into());

                    while let Some(tile) = state.get_next_tile() {
                        (started_tile_callback)(*tile);

                        worker.render_tile(
                            &state.scene,
                            &state.environment,
                            &state.camera,
                            &state.settings,
                            tile,
                            &mut buffer,
                        );
                        state
                            .image
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .copy_from(
                                buffer.view(0, 0, tile.width(), tile.height()).deref(),
                                tile.min.x,
                                tile.min.y,
                            )
                            .unwrap_or_else(|_| {
                                unreachable!("The buffer should always fit into the output")
                            });

                        let finished = state.finished_tiles.fetch_add(1, Ordering::AcqRel) + 1;
                        (finished_tile_callback)(
                            *tile,
                            Progress {
                                finished,
                                total: state.tile_ordering.len(),
                            },
                        );
                    }

                    worker.add_counters_to(
                        &mut state.counters.lock().unwrap_or_else(PoisonError::into_inner),
                    );
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenderProgress {
        render_state: state,
        threads,
    })
}

pub struct RenderProgress {
    render_state: Arc<RenderState>,
    threads: Vec<JoinHandle<()>>,
}

impl RenderProgress {
    pub fn progress(&self) -> Progress {
        Progress {
            finished: self.render_state.finished_tiles.load(Ordering::Acquire),
            total: self.render_state.tile_ordering.len(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|handle| handle.is_finished())
    }

    /// Signal the workers to abort.
    /// Any running workers will still finish their tiles, but no new ones will be started.
    pub fn abort(&self) {
        self.render_state
            .next_tile_index
            .store(self.render_state.tile_ordering.len(), Ordering::Release);
    }

    /// Blocks until all workers are finished.
    pub fn wait(&mut self) -> anyhow::Result<()> {
        let mut panicked = 0;
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            anyhow::bail!("{panicked} worker threads panicked");
        }
        Ok(())
    }

    pub fn image(&self) -> &Mutex<RgbaImage> {
        &self.render_state.image
    }

    /// Totals from all workers that already finished.
    pub fn counters(&self) -> RenderCounters {
        *self
            .render_state
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

struct RenderState {
    scene: Arc<Scene>,
    environment: Environment,
    camera: Camera,
    settings: RenderSettings,

    image: Mutex<RgbaImage>,

    tile_ordering: Vec<ScreenBlock>,
    next_tile_index: AtomicUsize,
    finished_tiles: AtomicUsize,

    counters: Mutex<RenderCounters>,
}

impl RenderState {
    fn get_next_tile(&self) -> Option<&ScreenBlock> {
        let id = self.next_tile_index.fetch_add(1, Ordering::AcqRel);
        self.tile_ordering.get(id)
    }
}
