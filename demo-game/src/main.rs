use stockpile::base::{LoadError, LoadResult, Resource, ResourceCore, ResourceHandle};
use stockpile::import::{ImportFormatLoader, Importer, ImporterRegistry};
use stockpile::loader::{
    FormatLoader, InteractiveLoadState, LoadContext, LoadStatus, ProjectSettings, ResourceManager,
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

pub fn default_project_path() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/data"))
}

#[derive(StructOpt, Debug)]
pub struct DemoArgs {
    // Directory containing stockpile_project.json, or any directory below it
    #[structopt(name = "project", long, parse(from_os_str))]
    pub project: Option<PathBuf>,
    #[structopt(name = "threads", long, default_value = "4")]
    pub threads: usize,
    #[structopt(name = "locale", long)]
    pub locale: Option<String>,
    #[structopt(name = "trace", long)]
    pub trace: bool,
    // Resource paths to load, ex. res://hello.txt
    pub paths: Vec<String>,
}

struct TextResource {
    core: ResourceCore,
    text: String,
}

impl Resource for TextResource {
    fn core(&self) -> &ResourceCore {
        &self.core
    }

    fn resource_type(&self) -> &str {
        "Text"
    }
}

struct TextLoader;

impl FormatLoader for TextLoader {
    fn recognized_extensions(&self) -> Vec<String> {
        vec!["txt".to_string()]
    }

    fn handles_type(
        &self,
        type_name: &str,
    ) -> bool {
        type_name == "Text"
    }

    fn load(
        &self,
        ctx: &LoadContext,
        path: &str,
        _original_path: &str,
    ) -> LoadResult<ResourceHandle> {
        let text = ctx.file_access().read_to_string(path)?;
        Ok(Arc::new(TextResource {
            core: ResourceCore::default(),
            text,
        }))
    }

    fn resource_type(
        &self,
        _ctx: &LoadContext,
        _path: &str,
    ) -> Option<String> {
        Some("Text".to_string())
    }
}

// Stands in for an offline importer: .obj files were "converted" to text ahead of time
struct PassthroughImporter;

impl Importer for PassthroughImporter {
    fn importer_name(&self) -> &str {
        "passthrough"
    }

    fn recognized_extensions(&self) -> Vec<String> {
        vec!["obj".to_string()]
    }

    fn resource_type(&self) -> &str {
        "Text"
    }
}

fn describe(resource: &ResourceHandle) -> String {
    let text = resource
        .downcast_ref::<TextResource>()
        .map(|x| x.text.trim().to_string())
        .unwrap_or_default();
    format!(
        "{} [{}] translated: {} import path: '{}' text: '{}'",
        resource.path(),
        resource.resource_type(),
        resource.core().is_translation_remapped(),
        resource.core().import_path(),
        text
    )
}

fn create_manager(args: &DemoArgs) -> Result<(ResourceManager, Arc<ImporterRegistry>), LoadError> {
    let project_path = args.project.clone().unwrap_or_else(default_project_path);
    let mut settings = ProjectSettings::locate_project_file(&project_path)?;
    if let Some(locale) = &args.locale {
        settings.locale = locale.clone();
    }

    let manager = ResourceManager::from_project_settings(&settings)?;
    let registry = Arc::new(ImporterRegistry::new(
        manager.file_access().clone(),
        settings.features.clone(),
    ));
    registry.add_importer(Arc::new(PassthroughImporter))?;

    manager.add_format_loader(Arc::new(ImportFormatLoader::new(registry.clone())), true)?;
    manager.add_format_loader(Arc::new(TextLoader), false)?;
    manager.set_loaded_callback(Some(Arc::new(|resource: &ResourceHandle, path: &str| {
        log::info!("Loaded {} as {}", path, resource.resource_type());
    })));

    Ok((manager, registry))
}

fn run(args: &DemoArgs) -> Result<(), Box<dyn Error>> {
    let (manager, registry) = create_manager(args)?;
    stockpile::loader::initialize(manager.clone());
    log::info!(
        "Import settings hash: {}",
        registry.get_import_settings_hash()
    );

    let paths = if args.paths.is_empty() {
        vec![
            "res://hello.txt".to_string(),
            "res://model.obj".to_string(),
            "res://moved.txt".to_string(),
            "res://hello.txt".to_string(),
            "res://missing.png".to_string(),
        ]
    } else {
        args.paths.clone()
    };

    for path in &paths {
        println!(
            "{}: type {:?} import remap {} deps {:?}",
            path,
            manager.get_resource_type(path),
            manager.import_remap(path),
            manager.get_dependencies(path, true)
        );
    }

    // Load everything on worker threads. Concurrent loads of the same path end up with the same
    // resource.
    let (work_tx, work_rx) = crossbeam_channel::unbounded::<String>();
    let (result_tx, result_rx) =
        crossbeam_channel::unbounded::<(String, Result<ResourceHandle, LoadError>)>();

    let mut workers = Vec::default();
    for _ in 0..args.threads.max(1) {
        let work_rx = work_rx.clone();
        let result_tx = result_tx.clone();
        let manager = manager.clone();
        workers.push(std::thread::spawn(move || {
            profiling::register_thread!("load worker");
            for path in work_rx {
                let result = manager.load(&path);
                if result_tx.send((path, result)).is_err() {
                    break;
                }
            }
        }));
    }

    for path in &paths {
        work_tx.send(path.clone())?;
    }
    drop(work_tx);
    drop(result_tx);

    let mut loaded = Vec::default();
    for (path, result) in result_rx {
        match result {
            Ok(resource) => {
                println!("{} -> {}", path, describe(&resource));
                loaded.push(resource);
            }
            Err(e) => println!("{} -> error: {}", path, e),
        }
    }

    for worker in workers {
        if worker.join().is_err() {
            log::error!("Load worker panicked");
        }
    }

    // Same first path again, staged this time. It is usually cached by now.
    if let Some(path) = paths.first() {
        let mut job = manager.load_interactive_with(path, "", true)?;
        while let LoadStatus::InProgress = job.poll() {
            println!("{} stage {}/{}", path, job.stage(), job.stage_count());
        }

        match job.state() {
            InteractiveLoadState::Success => {
                if let Some(resource) = job.resource() {
                    println!("interactive {} -> {}", path, describe(&resource));
                }
            }
            _ => println!("interactive {} failed: {:?}", path, job.error()),
        }
    }

    println!("{} resources cached", manager.cache().len());
    drop(loaded);
    stockpile::loader::finalize();
    Ok(())
}

fn main() {
    let args = DemoArgs::from_args();

    // Setup logging
    env_logger::Builder::default()
        .write_style(env_logger::WriteStyle::Always)
        .filter_level(if args.trace {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Debug
        })
        .init();

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
