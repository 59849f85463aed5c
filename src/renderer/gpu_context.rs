use std::sync::mpsc::{self, Receiver, TryRecvError};

use wgpu::{Adapter, Device, Instance, Queue};

use crate::config::{ContextOptions, PowerPreference};
use crate::error::ContextErrorCode;
use crate::probe::{ContextInfo, ContextProvider, Tier};
use crate::surface::{
    CreationError, Listener, ListenerSet, LostEvent, Subscription, Surface, SurfaceFactory,
    SurfaceId, SurfaceRequest, SurfaceSignal,
};

fn backends_for(tier: Tier) -> wgpu::Backends {
    match tier {
        Tier::Enhanced => wgpu::Backends::PRIMARY,
        Tier::Baseline => wgpu::Backends::GL,
    }
}

fn limits_for(tier: Tier) -> wgpu::Limits {
    match tier {
        Tier::Enhanced => wgpu::Limits::default(),
        Tier::Baseline => wgpu::Limits::downlevel_webgl2_defaults(),
    }
}

fn power_preference(preference: PowerPreference) -> wgpu::PowerPreference {
    match preference {
        PowerPreference::Default => wgpu::PowerPreference::None,
        PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
        PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
    }
}

fn request_adapter(tier: Tier, options: &ContextOptions) -> Result<Adapter, String> {
    let instance = Instance::new(&wgpu::InstanceDescriptor {
        backends: backends_for(tier),
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: power_preference(options.power_preference),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .map_err(|e| format!("no adapter: {e}"))?;

    let info = adapter.get_info();
    if options.fail_if_major_performance_caveat && info.device_type == wgpu::DeviceType::Cpu {
        return Err(format!("{} is a software adapter", info.name));
    }
    Ok(adapter)
}

fn request_device(adapter: &Adapter, tier: Tier, label: &str) -> Result<(Device, Queue), String> {
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some(label),
        required_features: wgpu::Features::empty(),
        required_limits: limits_for(tier),
        memory_hints: wgpu::MemoryHints::default(),
        experimental_features: wgpu::ExperimentalFeatures::default(),
        trace: wgpu::Trace::Off,
    }))
    .map_err(|e| format!("device request failed: {e}"))
}

fn context_info(adapter: &Adapter) -> ContextInfo {
    let info = adapter.get_info();
    ContextInfo {
        name: info.name,
        backend: format!("{:?}", info.backend),
    }
}

/// Probes wgpu adapters: primary backends (Vulkan, Metal, DX12) for the
/// enhanced tier, GL for the baseline tier.
#[derive(Debug, Default, Clone, Copy)]
pub struct WgpuProvider;

impl ContextProvider for WgpuProvider {
    fn try_context(&self, tier: Tier, options: &ContextOptions) -> Result<ContextInfo, String> {
        let adapter = request_adapter(tier, options)?;
        // Open and immediately release a device so the probe holds nothing
        let (device, queue) = request_device(&adapter, tier, "devverse probe")?;
        drop(queue);
        drop(device);
        Ok(context_info(&adapter))
    }
}

/// Color format scenes render into.
pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// What a scene hook should render into, derived from the request's
/// [`ContextOptions`] and what the adapter supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTarget {
    pub tier: Tier,
    pub format: wgpu::TextureFormat,
    /// 4 when antialiasing was requested and the adapter can multisample
    /// [`SCENE_FORMAT`], otherwise 1.
    pub sample_count: u32,
    pub alpha: bool,
}

impl SceneTarget {
    fn new(tier: Tier, options: &ContextOptions, flags: wgpu::TextureFormatFeatureFlags) -> Self {
        Self {
            tier,
            format: SCENE_FORMAT,
            sample_count: sample_count(options.antialias, flags),
            alpha: options.alpha,
        }
    }

    /// Alpha mode to configure a presentation surface with.
    pub fn alpha_mode(&self) -> wgpu::CompositeAlphaMode {
        if self.alpha {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            wgpu::CompositeAlphaMode::Opaque
        }
    }
}

fn sample_count(antialias: bool, flags: wgpu::TextureFormatFeatureFlags) -> u32 {
    if !antialias {
        return 1;
    }
    if flags.contains(wgpu::TextureFormatFeatureFlags::MULTISAMPLE_X4) {
        4
    } else {
        log::debug!(
            "Antialiasing requested but {:?} cannot be multisampled",
            SCENE_FORMAT
        );
        1
    }
}

/// Translate an error captured from the device into a creation error,
/// keeping the kind as a [`ContextErrorCode`] where one matches.
fn creation_error(error: &wgpu::Error) -> CreationError {
    let base = CreationError::new(error.to_string());
    match error {
        wgpu::Error::OutOfMemory { .. } => base.with_code(ContextErrorCode::OutOfMemory),
        wgpu::Error::Validation { .. } => base.with_code(ContextErrorCode::InvalidOperation),
        wgpu::Error::Internal { .. } => base,
    }
}

/// Hook run once the device exists; an error it returns, or a validation or
/// out-of-memory error it triggers on the device, is reported as a creation
/// failure of the surface.
pub type SceneInit = Box<dyn FnMut(&Device, &Queue, &SceneTarget) -> Result<(), String>>;

fn init_scene(
    scene: &mut SceneInit,
    device: &Device,
    queue: &Queue,
    target: &SceneTarget,
) -> Result<(), CreationError> {
    let oom = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);

    let result = scene(device, queue, target);

    let validation = pollster::block_on(validation.pop());
    let oom = pollster::block_on(oom.pop());

    if let Some(error) = oom.as_ref().or(validation.as_ref()) {
        return Err(creation_error(error));
    }
    result.map_err(CreationError::new)
}

/// Mounts wgpu devices as accelerated surfaces.
pub struct WgpuSurfaceFactory {
    scene: Option<SceneInit>,
}

impl Default for WgpuSurfaceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl WgpuSurfaceFactory {
    pub fn new() -> Self {
        Self { scene: None }
    }

    pub fn with_scene<F>(mut self, scene: F) -> Self
    where
        F: FnMut(&Device, &Queue, &SceneTarget) -> Result<(), String> + 'static,
    {
        self.scene = Some(Box::new(scene));
        self
    }
}

impl SurfaceFactory for WgpuSurfaceFactory {
    fn create(&mut self, request: SurfaceRequest) -> Box<dyn Surface> {
        let mut surface = WgpuSurface {
            id: request.id,
            listeners: ListenerSet::new(),
            device: None,
            lost: None,
            pending: Vec::new(),
        };

        let opened = request_adapter(request.tier, &request.options).and_then(|adapter| {
            let label = format!("devverse surface {}", request.id.raw());
            let (device, queue) = request_device(&adapter, request.tier, &label)?;
            let flags = adapter.get_texture_format_features(SCENE_FORMAT).flags;
            let target = SceneTarget::new(request.tier, &request.options, flags);
            Ok((context_info(&adapter), target, device, queue))
        });

        match opened {
            Ok((info, target, device, queue)) => {
                log::info!(
                    "Surface {} using {} ({}), {}x MSAA",
                    request.id.raw(),
                    info.name,
                    info.backend,
                    target.sample_count
                );
                let (tx, rx) = mpsc::channel();
                device.set_device_lost_callback(move |reason, message| {
                    let _ = tx.send((reason, message));
                });

                let initialized = match self.scene.as_mut() {
                    Some(scene) => init_scene(scene, &device, &queue, &target),
                    None => Ok(()),
                };

                match initialized {
                    Ok(()) => surface.pending.push(SurfaceSignal::Created),
                    Err(error) => surface.pending.push(SurfaceSignal::CreationError(error)),
                }
                surface.device = Some((device, queue));
                surface.lost = Some(rx);
            }
            Err(message) => {
                surface
                    .pending
                    .push(SurfaceSignal::CreationError(CreationError::new(message)));
            }
        }

        Box::new(surface)
    }
}

type LostNotice = (wgpu::DeviceLostReason, String);

/// A wgpu device standing in for the accelerated surface.
///
/// Creation results are queued and delivered on the first `dispatch`, after
/// the gate has attached its listeners. Device-lost callbacks arrive on an
/// arbitrary thread and are forwarded through a channel.
pub struct WgpuSurface {
    id: SurfaceId,
    listeners: ListenerSet,
    device: Option<(Device, Queue)>,
    lost: Option<Receiver<LostNotice>>,
    pending: Vec<SurfaceSignal>,
}

impl WgpuSurface {
    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref().map(|(device, _)| device)
    }

    pub fn queue(&self) -> Option<&Queue> {
        self.device.as_ref().map(|(_, queue)| queue)
    }

    fn take_lost(&mut self) -> Option<LostNotice> {
        let rx = self.lost.as_ref()?;
        match rx.try_recv() {
            Ok(notice) => Some(notice),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.lost = None;
                None
            }
        }
    }
}

impl Surface for WgpuSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn subscribe(&mut self, listener: Listener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    fn dispatch(&mut self) {
        for mut signal in std::mem::take(&mut self.pending) {
            self.listeners.emit(&mut signal);
        }

        while let Some((reason, message)) = self.take_lost() {
            if matches!(reason, wgpu::DeviceLostReason::Destroyed) {
                continue;
            }
            log::warn!("Surface {} lost its device: {}", self.id.raw(), message);

            let mut signal = SurfaceSignal::Lost(LostEvent::new());
            self.listeners.emit(&mut signal);
            let prevented = matches!(&signal, SurfaceSignal::Lost(lost) if lost.default_prevented());
            if !prevented {
                // Nobody intends to recover: release the device for good
                self.device = None;
                self.lost = None;
            }
        }
    }
}
