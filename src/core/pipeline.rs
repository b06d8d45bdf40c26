use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use glam::Vec3;

use super::asset::{AssetSlot, LoadProgress};
use super::disposable::DisposedFlag;
use super::navigation::NavigationController;
use super::scene::{EnvironmentMap, ModelGraph, SceneGraph};
use super::signal::Signal;
use crate::config::{CameraConfig, DecoderConfig, InitialPoseStrategy};
use crate::error::{AssetKind, AssetLoadError};
use crate::math::BoundingVolume;
use crate::traits::{AssetFetcher, EnvironmentDecoder, ModelDecoder, ProgressCallback};
use crate::types::CameraPose;

/// Camera standing at eye height in the middle of `bounds`, looking toward -Z
pub fn eye_level_pose(bounds: &BoundingVolume, eye_height: f32) -> CameraPose {
    let center = bounds.center();
    let y = bounds.min.y + eye_height;
    let position = Vec3::new(center.x, y, center.z);
    let mut target = Vec3::new(center.x, y, bounds.min.z);
    if (target - position).length_squared() < f32::EPSILON {
        target = position + Vec3::NEG_Z;
    }
    CameraPose::new(position, target)
}

/// Collaborators a pipeline loads through
pub struct AssetSources {
    pub fetcher: Rc<dyn AssetFetcher>,
    pub model_decoder: Rc<dyn ModelDecoder>,
    pub environment_decoder: Rc<dyn EnvironmentDecoder>,
}

/// Fetches and decodes the environment map and the model concurrently on the
/// local executor, then places them in the scene.
pub struct AssetPipeline {
    sources: Rc<AssetSources>,
    scene: Rc<RefCell<SceneGraph>>,
    navigation: Rc<RefCell<NavigationController>>,
    spawner: LocalSpawner,
    disposed: DisposedFlag,
    progress: Signal<LoadProgress>,
    camera: CameraConfig,
    bounds_padding: f32,
}

impl AssetPipeline {
    pub fn new(
        sources: AssetSources,
        scene: Rc<RefCell<SceneGraph>>,
        navigation: Rc<RefCell<NavigationController>>,
        spawner: LocalSpawner,
        disposed: DisposedFlag,
        camera: CameraConfig,
        bounds_padding: f32,
    ) -> Self {
        Self {
            sources: Rc::new(sources),
            scene,
            navigation,
            spawner,
            disposed,
            progress: Signal::new(),
            camera,
            bounds_padding,
        }
    }

    /// Byte progress for every load started by this pipeline
    pub fn progress(&self) -> Signal<LoadProgress> {
        self.progress.clone()
    }

    pub fn load_environment(&self, url: &str) -> AssetSlot<EnvironmentMap> {
        let slot = AssetSlot::pending(AssetKind::Environment, url);
        let url = url.to_string();
        let sources = self.sources.clone();
        let scene = self.scene.clone();
        let disposed = self.disposed.clone();
        let on_progress = self.progress_callback(AssetKind::Environment);
        let task_slot = slot.clone();

        let task = async move {
            let fetched = sources.fetcher.fetch(&url, on_progress).await;
            let result = fetched.and_then(|bytes| sources.environment_decoder.decode(&bytes));

            if disposed.is_set() {
                log::debug!("environment {} finished after dispose, discarding", url);
                return;
            }

            match result {
                Ok(environment) => {
                    log::info!(
                        "environment {} loaded ({}x{})",
                        url,
                        environment.width,
                        environment.height
                    );
                    let environment = Rc::new(environment);
                    scene.borrow_mut().set_environment(environment.clone());
                    task_slot.resolve(Ok(environment));
                }
                Err(e) => {
                    let err = AssetLoadError::from_anyhow(AssetKind::Environment, &url, &e);
                    log::error!("{}", err);
                    task_slot.resolve(Err(err));
                }
            }
        };

        self.spawn(&slot, task);
        slot
    }

    pub fn load_model(&self, url: &str, decoder: &DecoderConfig) -> AssetSlot<ModelGraph> {
        let slot = AssetSlot::pending(AssetKind::Model, url);
        let url = url.to_string();
        let decoder = decoder.clone();
        let sources = self.sources.clone();
        let scene = self.scene.clone();
        let navigation = self.navigation.clone();
        let disposed = self.disposed.clone();
        let on_progress = self.progress_callback(AssetKind::Model);
        let camera = self.camera.clone();
        let padding = self.bounds_padding;
        let task_slot = slot.clone();

        let task = async move {
            let fetched = sources.fetcher.fetch(&url, on_progress).await;
            let result = fetched.and_then(|bytes| sources.model_decoder.decode(&bytes, &decoder));

            if disposed.is_set() {
                log::debug!("model {} finished after dispose, discarding", url);
                return;
            }

            match result {
                Ok(model) => {
                    log::info!(
                        "model {} loaded: {} meshes, {} triangles",
                        url,
                        model.meshes.len(),
                        model.triangle_count()
                    );
                    let model = Rc::new(model);
                    let bounds = model.bounds().map(|b| b.expand(padding));
                    scene.borrow_mut().set_model(model.clone(), bounds);

                    if let Some(bounds) = bounds {
                        let mut navigation = navigation.borrow_mut();
                        navigation.set_bounds(&bounds);
                        if camera.initial_pose == InitialPoseStrategy::FromBounds {
                            navigation.set_pose(eye_level_pose(&bounds, camera.eye_height));
                        }
                    }
                    task_slot.resolve(Ok(model));
                }
                Err(e) => {
                    let err = AssetLoadError::from_anyhow(AssetKind::Model, &url, &e);
                    log::error!("{}", err);
                    task_slot.resolve(Err(err));
                }
            }
        };

        self.spawn(&slot, task);
        slot
    }

    fn progress_callback(&self, kind: AssetKind) -> ProgressCallback {
        let progress = self.progress.clone();
        let disposed = self.disposed.clone();
        Box::new(move |loaded, total| {
            if !disposed.is_set() {
                log::debug!("{} progress: {} / {:?} bytes", kind, loaded, total);
                progress.emit(&LoadProgress::new(kind, loaded, total));
            }
        })
    }

    fn spawn<T>(&self, slot: &AssetSlot<T>, task: impl Future<Output = ()> + 'static) {
        if let Err(e) = self.spawner.spawn_local(task) {
            let err = AssetLoadError::new(slot.kind(), slot.url(), format!("cannot spawn load: {}", e));
            log::error!("{}", err);
            slot.resolve(Err(err));
        }
    }
}
