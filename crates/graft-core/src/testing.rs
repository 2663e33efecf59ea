//! Fixture helpers for building plugin packages in tests.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Writes a zip archive at `path` containing the given `(name, contents)`
/// entries.
///
/// Panics on I/O failure; only meant for test fixtures.
pub fn write_package(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).expect("create package fixture");
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, contents) in entries {
        zip.start_file(*name, options).expect("start package entry");
        zip.write_all(contents.as_bytes())
            .expect("write package entry");
    }

    zip.finish().expect("finish package fixture");
}

/// Writes a package holding only a descriptor at the conventional path.
pub fn write_plugin_package(path: &Path, descriptor: &str) {
    write_package(path, &[(crate::package::DESCRIPTOR_NAME, descriptor)]);
}
