//! Built-in recipes for the scene-description dependency line.
//!
//! Recipes are listed in dependency order; the registry rejects any table
//! where a prerequisite comes after the target that needs it.

use std::collections::BTreeMap;

use crate::platform::Os;

use super::{Backend, Condition, Configuration, PrepareStep, Recipe, ScriptBuild, Source, StagingRule};

const ZLIB_FLAGS: [(&str, &str); 2] = [
  ("ZLIB_INCLUDE_DIR", "$${stage}/include/zlib"),
  ("ZLIB_LIBRARY", "$${stage}/lib/zlibstatic.lib"),
];

/// Recipes for `os`, in processing order.
pub fn recipes(os: Os) -> Vec<Recipe> {
  vec![
    zlib(),
    boost(os),
    tbb(),
    double_conversion(),
    ilmbase(),
    hdf5(),
    openexr(os),
    ptex(),
    opensubdiv(),
    alembic(),
    usd(os),
  ]
}

fn zlib() -> Recipe {
  Recipe::new("zlib", Source::archive("zlib-1.2.11.zip", "zlib-1.2.11"))
    .backend(Backend::cmake(["zlibstatic"]))
    .staging(StagingRule::new(["$${src}", "$${out}"], ["$${out}"]))
}

fn boost(os: Os) -> Recipe {
  let version = match os {
    Os::Windows => "boost_1_63_0",
    Os::Linux | Os::MacOs => "boost_1_55_0",
  };

  let mut tokens = BTreeMap::from([
    ("SOURCEPATH".to_string(), "$${src}".to_string()),
    ("BUILDPATH".to_string(), "$${out}".to_string()),
    ("STAGEPATH".to_string(), "$${stage}".to_string()),
  ]);
  let (template, script_name) = match os {
    Os::Windows => {
      tokens.insert("VSVERSION".to_string(), "$${vsversion}".to_string());
      ("boost/build_boost.bat", "build_boost.bat")
    }
    Os::MacOs => {
      tokens.insert("GCC_CXX".to_string(), "$${cxx}".to_string());
      ("boost/build_boost_darwin.sh", "build_boost.sh")
    }
    Os::Linux => {
      tokens.insert("GCC_CXX".to_string(), "$${cxx}".to_string());
      ("boost/build_boost.sh", "build_boost.sh")
    }
  };

  Recipe::new("boost", Source::archive(&format!("{version}.tar.bz2"), version))
    .prepare(
      PrepareStep::append_line("tools/build/v2/user-config.jam", "using gcc : 4.8 : $${cxx} ;")
        .when(Condition::CustomToolchain),
    )
    .backend(Backend::Script(ScriptBuild {
      template: template.to_string(),
      script_name: script_name.to_string(),
      tokens,
    }))
    .staging(StagingRule::new(["$${src}/boost"], ["$${out}/lib"]))
}

fn tbb() -> Recipe {
  Recipe::new("tbb", Source::archive("tbb-tbb43u6.tgz", "tbb-tbb43u6"))
    .dependents(&["opensubdiv"])
    .prepare(PrepareStep::patch_after_extract(
      "include/tbb/tbb_config.h",
      "tbb/tbb_config.h.patch",
    ))
    // Disables the rtm option; applied on every run, so an already patched
    // tree must not fail the build.
    .prepare(
      PrepareStep::optional_patch("CMakeLists.txt", "tbb/CMakeLists.txt.patch").when(Condition::CustomToolchain),
    )
    .backend(Backend::cmake(["tbbmalloc", "tbb"]))
    .staging(StagingRule::new(["$${src}/include"], ["$${out}"]))
}

fn double_conversion() -> Recipe {
  Recipe::new(
    "double-conversion",
    Source::archive("double-conversion-1.1.5.tar.gz", "double-conversion-1.1.5"),
  )
  .backend(Backend::cmake(["all"]))
  .staging(StagingRule::new(["$${src}/src"], ["$${out}/src"]))
}

fn ilmbase() -> Recipe {
  Recipe::new("ilmbase", Source::archive("ilmbase-2.2.0.tar.gz", "ilmbase-2.2.0"))
    .dependents(&["openexr"])
    .backend(Backend::cmake(["all"]).flag("BUILD_SHARED_LIBS", "off"))
    .staging(StagingRule::new(["$${src}"], ["$${out}"]))
}

fn hdf5() -> Recipe {
  Recipe::new("hdf5", Source::archive("hdf5-1.8.9.tar.bz2", "hdf5-1.8.9"))
    .dependents(&["alembic"])
    .exclude_from_all()
    .prepare(PrepareStep::patch_after_extract(
      "config/cmake/ConfigureChecks.cmake",
      "hdf5/ConfigureChecks.cmake.patch",
    ))
    .backend(Backend::cmake(["src/hdf5", "hl/src/hdf5_hl"]).flags([
      ("BUILD_SHARED_LIBS", "off"),
      ("HDF5_BUILD_HL_LIB", "on"),
      ("H5_HAVE_TIMEZONE", "off"),
    ]))
    .staging(StagingRule::new(
      ["$${src}/src", "$${src}/hl/src", "$${out}"],
      ["$${out}/bin/Release"],
    ))
}

fn openexr(os: Os) -> Recipe {
  if os == Os::MacOs {
    return Recipe::new(
      "openexr",
      Source::prebuilt("$${prebuilt}/ThirdParty/PreBuilt/Darwin/x86_64/stdlib-libc++/Release/openexr"),
    )
    .requires(&["ilmbase"])
    .staging(StagingRule::new(["$${src}"], ["$${src}"]));
  }

  let projects = match os {
    Os::Windows => ["IlmImf/IlmImf", "IlmImfUtil/IlmImfUtil"],
    Os::Linux | Os::MacOs => ["IlmImf", "IlmImfUtil"],
  };

  Recipe::new("openexr", Source::archive("openexr-2.2.0.tar.gz", "openexr-2.2.0"))
    .requires(&["zlib", "ilmbase"])
    .prepare(PrepareStep::patch_after_extract("CMakeLists.txt", "openexr/CMakeLists.txt.patch"))
    .prepare(PrepareStep::patch_after_extract(
      "IlmImf/CMakeLists.txt",
      "openexr/IlmImf.CMakeLists.txt.patch",
    ))
    .backend(Backend::cmake(projects).flags(ZLIB_FLAGS).flags([
      ("BUILD_SHARED_LIBS", "off"),
      ("ILMBASE_INCLUDE_DIR", "$${stage}/include/ilmbase"),
      ("ILMBASE_LIBRARY_DIR", "$${stage}/lib"),
    ]))
    .staging(StagingRule::new(["$${src}"], ["$${out}"]))
}

fn ptex() -> Recipe {
  Recipe::new("ptex", Source::archive("ptex-2.0.41.zip", "ptex-2.0.41"))
    .dependents(&["opensubdiv"])
    .requires(&["zlib"])
    .exclude_from_all()
    .backend(
      Backend::cmake(["ptex/Ptex_static"])
        .source("$${src}/src")
        .flags(ZLIB_FLAGS)
        .flag("BUILD_SHARED_LIBS", "off"),
    )
    .staging(StagingRule::new(["$${src}/src/ptex"], ["$${out}/ptex/Release"]))
}

fn opensubdiv() -> Recipe {
  Recipe::new("opensubdiv", Source::archive("OpenSubdiv-3_0_5.tar.gz", "OpenSubdiv-3_0_5"))
    .requires(&["zlib", "tbb", "ptex"])
    .exclude_from_all()
    .backend(Backend::cmake(["opensubdiv/osd_static_cpu"]).flags(ZLIB_FLAGS).flags([
      ("BUILD_SHARED_LIBS", "off"),
      ("PTEX_INCLUDE_DIR", "$${stage}/include"),
      ("PTEX_LIBRARY", "$${target:ptex}/build/ptex/Release/Ptex.lib"),
      ("TBB_INCLUDE_DIR", "$${stage}/include/tbb"),
      ("TBB_LIBRARIES", "$${stage}/lib"),
      ("NO_LIB", "off"),
      ("NO_EXAMPLES", "on"),
      ("NO_TUTORIALS", "on"),
      ("NO_REGRESSION", "off"),
      ("NO_MAYA", "on"),
      ("NO_PTEX", "off"),
      ("NO_DOC", "on"),
      ("NO_OMP", "on"),
      ("NO_TBB", "off"),
      ("NO_CUDA", "on"),
      ("NO_OPENCL", "on"),
      ("NO_CLEW", "on"),
      ("NO_OPENGL", "on"),
      ("NO_DX", "on"),
      ("NO_TESTS", "on"),
      ("NO_GLTESTS", "on"),
    ]))
    .staging(StagingRule::new(["$${src}/opensubdiv"], ["$${out}/lib/Release"]))
}

fn alembic() -> Recipe {
  let libraries = [
    "Abc/AlembicAbc",
    "AbcCollection/AlembicAbcCollection",
    "AbcCoreAbstract/AlembicAbcCoreAbstract",
    "AbcCoreFactory/AlembicAbcCoreFactory",
    "AbcCoreHDF5/AlembicAbcCoreHDF5",
    "AbcCoreOgawa/AlembicAbcCoreOgawa",
    "AbcGeom/AlembicAbcGeom",
    "AbcMaterial/AlembicAbcMaterial",
    "Ogawa/AlembicOgawa",
    "Util/AlembicUtil",
  ];

  Recipe::new("alembic", Source::archive("alembic-1.5.8.tar.gz", "alembic-1.5.8"))
    .requires(&["zlib", "boost", "ilmbase", "hdf5"])
    .exclude_from_all()
    .prepare(PrepareStep::patch_after_extract("CMakeLists.txt", "alembic/CMakeLists.txt.patch"))
    .prepare(PrepareStep::patch_after_extract(
      "lib/Alembic/Abc/Foundation.h",
      "alembic/Foundation.h.patch",
    ))
    .backend(
      Backend::cmake(libraries.iter().map(|lib| format!("lib/Alembic/{lib}")))
        .flags(ZLIB_FLAGS)
        .flags([
          ("BUILD_SHARED_LIBS", "off"),
          ("BOOST_INCLUDEDIR", "$${stage}/include"),
          ("BOOST_LIBRARYDIR", "$${stage}/lib"),
          ("ALEMBIC_ILMBASE_INCLUDE_DIRECTORY", "$${stage}/include/ilmbase"),
          ("ILMBASE_ROOT", "$${stage}"),
          ("ILMBASE_LIBRARY_DIR", "$${stage}/lib"),
          ("ALEMBIC_ILMBASE_HALF_LIB", "$${stage}/lib/Half.lib"),
          ("ALEMBIC_ILMBASE_IEX_LIB", "$${stage}/lib/Iex.lib"),
          ("ALEMBIC_ILMBASE_ILMTHREAD_LIB", "$${stage}/lib/IlmThread-2_2.lib"),
          ("ALEMBIC_ILMBASE_IMATH_LIB", "$${stage}/lib/Imath-2_2.lib"),
          ("ALEMBIC_HDF5_INCLUDE_PATH", "$${stage}/include/hdf5"),
          ("ALEMBIC_HDF5_LIBS", "$${stage}/lib/hdf5.lib"),
          ("USE_PYILMBASE", "off"),
          ("USE_PRMAN", "off"),
          ("USE_ARNOLD", "off"),
          ("USE_MAYA", "off"),
          ("USE_PYALEMBIC", "off"),
        ]),
    )
    .staging(StagingRule::new(["$${src}/lib/Alembic"], ["$${out}/lib"]))
}

fn usd(os: Os) -> Recipe {
  let (packages_patch, lib_prefix) = match os {
    Os::Windows => ("USD/Packages.cmake.patch", ""),
    Os::Linux | Os::MacOs => ("USD/Packages.cmake.gcc.patch", "lib"),
  };
  let patches = [
    ("cmake/defaults/Packages.cmake", packages_patch),
    ("cmake/macros/Public.cmake", "USD/Public.cmake.patch"),
    ("pxr/usd/lib/sdf/layer.h", "USD/sdf.layer.h.patch"),
    ("pxr/usd/lib/sdf/textFileFormat.cpp", "USD/textFileFormat.cpp.patch"),
    ("pxr/base/lib/arch/fileSystem.cpp", "USD/fileSystem.cpp.patch"),
    ("pxr/base/lib/tf/fileUtils.cpp", "USD/fileUtils.cpp.patch"),
    ("pxr/base/lib/vt/value.h", "USD/vt.value.h.patch"),
    ("pxr/base/lib/plug/CMakeLists.txt", "USD/plug.CMakeLists.txt.patch"),
    ("pxr/usd/CMakeLists.txt", "USD/usd.CMakeLists.txt.patch"),
  ];

  let recipe = Recipe::new("usd", Source::checkout("$${root}/USD")).requires(&["boost", "tbb", "openexr"]);
  let recipe = patches
    .into_iter()
    .fold(recipe, |recipe, (file, patch)| recipe.prepare(PrepareStep::optional_patch(file, patch)));

  // Installs straight into the stage tree, so there is nothing left to stage.
  recipe.backend(
    Backend::cmake(["install"])
      .flags([
        ("BOOST_INCLUDEDIR", "$${stage}/include"),
        ("BOOST_LIBRARYDIR", "$${stage}/lib"),
        ("TBB_INCLUDE_DIR", "$${stage}/include/tbb"),
        ("TBB_LIBRARIES", "$${stage}/lib"),
        ("TBB_LIBRARY", "$${stage}/lib/lib"),
        ("OPENEXR_INCLUDE_DIR", "$${stage}/include"),
        ("OPENEXR_LIBRARY_DIR", "$${stage}/lib"),
        ("OPENEXR_Half_LIBRARY", "$${stage}/lib/Half"),
        ("PXR_STRICT_BUILD_MODE", "off"),
        ("PXR_LIB_PREFIX", lib_prefix),
        ("PXR_VALIDATE_GENERATED_CODE", "off"),
        ("PXR_BUILD_TESTS", "off"),
        ("PXR_BUILD_IMAGING", "off"),
        ("PXR_BUILD_USD_IMAGING", "off"),
        ("PXR_BUILD_KATANA_PLUGIN", "off"),
        ("PXR_BUILD_MAYA_PLUGIN", "off"),
        ("PXR_BUILD_ALEMBIC_PLUGIN", "off"),
        ("PXR_ENABLE_MULTIVERSE_SUPPORT", "off"),
        ("PXR_MAYA_TBB_BUG_WORKAROUND", "off"),
        ("PXR_ENABLE_NAMESPACES", "off"),
        ("PXR_INSTALL_LOCATION", "$${stage}"),
        ("CMAKE_INSTALL_PREFIX", "$${stage}"),
      ])
      .configuration(Configuration::Release),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::recipe::{PrepareAction, Trigger};

  fn find(recipes: &[Recipe], name: &str) -> Recipe {
    recipes.iter().find(|r| r.name == name).cloned().unwrap()
  }

  #[test]
  fn catalog_order_is_the_build_line() {
    let names: Vec<String> = recipes(Os::Linux).into_iter().map(|r| r.name).collect();
    assert_eq!(
      names,
      vec![
        "zlib",
        "boost",
        "tbb",
        "double-conversion",
        "ilmbase",
        "hdf5",
        "openexr",
        "ptex",
        "opensubdiv",
        "alembic",
        "usd"
      ]
    );
  }

  #[test]
  fn exclusions_from_all() {
    let recipes = recipes(Os::Linux);
    let excluded: Vec<&str> = recipes
      .iter()
      .filter(|r| r.exclude_from_all)
      .map(|r| r.name.as_str())
      .collect();
    assert_eq!(excluded, vec!["hdf5", "ptex", "opensubdiv", "alembic"]);
  }

  #[test]
  fn boost_script_differs_per_platform() {
    let Backend::Script(linux) = find(&recipes(Os::Linux), "boost").backend else {
      panic!("boost should be a script build");
    };
    assert_eq!(linux.template, "boost/build_boost.sh");
    assert!(linux.tokens.contains_key("GCC_CXX"));

    let Backend::Script(darwin) = find(&recipes(Os::MacOs), "boost").backend else {
      panic!("boost should be a script build");
    };
    assert_eq!(darwin.template, "boost/build_boost_darwin.sh");

    let windows = find(&recipes(Os::Windows), "boost");
    let Source::Archive { archive, folder } = &windows.source else {
      panic!("boost should come from an archive");
    };
    assert_eq!(archive, "boost_1_63_0.tar.bz2");
    assert_eq!(folder, "boost_1_63_0");
    let Backend::Script(script) = windows.backend else {
      panic!("boost should be a script build");
    };
    assert_eq!(script.script_name, "build_boost.bat");
    assert!(script.tokens.contains_key("VSVERSION"));
    assert!(!script.tokens.contains_key("GCC_CXX"));
  }

  #[test]
  fn openexr_is_prebuilt_on_darwin() {
    let darwin = find(&recipes(Os::MacOs), "openexr");
    assert!(matches!(darwin.source, Source::Prebuilt { .. }));
    assert_eq!(darwin.backend, Backend::None);

    let linux = find(&recipes(Os::Linux), "openexr");
    assert!(matches!(linux.source, Source::Archive { .. }));
  }

  #[test]
  fn openexr_projects_use_msbuild_paths_on_windows() {
    let Backend::CMake(build) = find(&recipes(Os::Windows), "openexr").backend else {
      panic!("openexr should be a cmake build");
    };
    assert_eq!(build.projects, vec!["IlmImf/IlmImf", "IlmImfUtil/IlmImfUtil"]);
  }

  #[test]
  fn usd_patches_are_optional_and_rerun() {
    let usd = find(&recipes(Os::Linux), "usd");
    assert_eq!(usd.prepare.len(), 9);
    for step in &usd.prepare {
      assert_eq!(step.trigger, Trigger::Always);
      let PrepareAction::Patch(patch) = &step.action else {
        panic!("usd only patches");
      };
      assert!(!patch.required);
    }
  }

  #[test]
  fn tbb_toolchain_patch_is_conditional() {
    let tbb = find(&recipes(Os::Linux), "tbb");
    let conditional: Vec<&PrepareStep> = tbb
      .prepare
      .iter()
      .filter(|s| s.condition == Condition::CustomToolchain)
      .collect();
    assert_eq!(conditional.len(), 1);
    assert_eq!(conditional[0].trigger, Trigger::Always);
  }
}
