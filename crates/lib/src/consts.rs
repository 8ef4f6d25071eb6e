/// Application name used for environment variable prefixes and log targets.
pub const APP_NAME: &str = "tpbuild";

/// Pseudo-target that removes the build and stage trees.
pub const CLEAN_TARGET: &str = "clean";

/// Pseudo-target that selects every recipe not excluded from it.
pub const ALL_TARGET: &str = "all";

/// Directory names below the project root.
pub const PKGS_DIR: &str = "pkgs";
pub const PATCHES_DIR: &str = "patches";
pub const BUILD_DIR: &str = "build";
pub const STAGE_DIR: &str = "stage";

/// Backend output folder inside `build/<target>/`.
pub const OUTPUT_SUBDIR: &str = "build";

/// Content written to completion markers. Only the file's existence matters.
pub const MARKER_CONTENT: &[u8] = b"done";

/// Extensions (lowercase, without the dot) staged into `stage/include/<target>/`.
pub const HEADER_EXTENSIONS: &[&str] = &["h", "hpp", "ipp"];

/// Extensions (lowercase, without the dot) flattened into `stage/lib/`.
pub const LIBRARY_EXTENSIONS: &[&str] = &["lib", "dll", "so", "dylib", "a"];

/// Default parallelism hint for native builds.
pub const DEFAULT_JOBS: usize = 4;

/// Environment variables read at startup.
pub const ENV_ROOT: &str = "TPBUILD_ROOT";
pub const ENV_TOOLCHAIN_ROOT: &str = "GCC_ROOT";
pub const ENV_PREBUILT_ROOT: &str = "FABRIC_SCENE_GRAPH_DIR";
pub const ENV_CMAKE: &str = "TPBUILD_CMAKE";
pub const ENV_MAKE: &str = "TPBUILD_MAKE";
pub const ENV_PATCH: &str = "TPBUILD_PATCH";
pub const ENV_MSBUILD: &str = "TPBUILD_MSBUILD";
pub const ENV_VS_VERSION: &str = "TPBUILD_VS_VERSION";
pub const ENV_VS_PATH: &str = "TPBUILD_VS_PATH";
