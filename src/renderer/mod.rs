mod gpu_context;

pub use gpu_context::{
    SceneInit, SceneTarget, WgpuProvider, WgpuSurface, WgpuSurfaceFactory, SCENE_FORMAT,
};
