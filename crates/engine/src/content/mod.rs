mod atomic_io;
mod catalog;
mod defaults;
mod export;
mod store;
mod types;
mod validation;

pub use catalog::SpriteCatalog;
pub use export::{
    export_bundle, BundleManifest, ExportError, BUNDLE_FORMAT_VERSION, BUNDLE_MANIFEST_FILE,
    BUNDLE_WORLD_FILE,
};
pub use store::{
    encode_world_document, import_world_document, load_world_document, parse_world_document,
    persist_world_document, DocumentFormatError, ImportError, ImportMode, ImportSummary,
    PersistError, WorldLoadError,
};
pub use types::{
    Capability, CapabilityTag, CellRead, FogSettings, GridPoint, LayerDef, LifeSystemConfig,
    MovementMode, NamedSize, RenderKind, SceneDef, SpriteCapabilities, SpriteDef, SpriteSize,
    TextNearConfig, WorldDocument, XrMode, COLLISION_LAYER_INDEX, DEFAULT_AR_PLAYER_SCALE,
    DEFAULT_BACKGROUND_COLOR,
};
pub use validation::WorldIssue;
