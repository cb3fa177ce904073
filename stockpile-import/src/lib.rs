mod import_loader;
mod import_record;
mod importer;
mod importer_registry;

pub use import_loader::ImportFormatLoader;
pub use import_record::ImportRecord;
pub use importer::Importer;
pub use importer_registry::{import_file_path, ImporterRegistry, IMPORT_DIR};
