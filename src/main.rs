// src/main.rs
use std::error::Error;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use env_logger::{Env, Target};
use log::{info, warn};
use textwrap::{termwidth, Options};

use epub_pager::navigation::flatten_toc;
use epub_pager::{parse_epub, ui, Book, BookStore, EpubError, JsonBookStore, ReaderConfig};

// Los libros van en un subdirectorio para no mezclarse con config.json
const BOOKS_DIR: &str = "books";
const LOG_FILE: &str = "reader.log";

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "epub_pager")]
#[command(version, about = "Lector de EPUB paginado para el terminal", long_about = None)]
#[command(after_help = "EJEMPLOS:
    epub_pager import libro.epub     Importa el libro a la biblioteca
    epub_pager list                  Lista los libros importados
    epub_pager read libro.epub       Importa (si hace falta) y abre el libro")]
struct Cli {
    /// Directorio de la biblioteca
    #[arg(long, value_name = "DIR", env = "EPUB_PAGER_LIBRARY", default_value = ".epub_pager")]
    library: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importa un .epub a la biblioteca
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Lista los libros de la biblioteca
    List,
    /// Muestra metadatos e índice de un .epub sin importarlo
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Abre un libro por id o por ruta a un .epub
    Read {
        #[arg(value_name = "BOOK")]
        book: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match &cli.command {
        Command::Import { file } => import(&cli.library, file).map(|book| {
            println!("{}  {}", book.id, book.title);
        }),
        Command::List => list(&cli.library),
        Command::Info { file } => show_info(&cli.library, file),
        Command::Read { book } => read(&cli.library, book),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

// Con la interfaz activa los logs no pueden ir a stderr: van a reader.log
fn init_logging(cli: &Cli) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    if let Command::Read { .. } = cli.command {
        let log_file = fs::create_dir_all(&cli.library).and_then(|()| File::create(cli.library.join(LOG_FILE)));
        match log_file {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("No se pudo crear {}: {}", LOG_FILE, e);
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    builder.init();
}

fn open_store(library: &Path) -> Result<JsonBookStore, EpubError> {
    JsonBookStore::open(library.join(BOOKS_DIR))
}

fn import(library: &Path, file: &Path) -> CliResult<Book> {
    let config = ReaderConfig::load(library)?;
    // Se guarda la ruta absoluta: la biblioteca puede abrirse desde otro sitio
    let file = fs::canonicalize(file)?;
    let book = parse_epub(&file, &config)?;
    open_store(library)?.put(&book)?;
    info!("Libro importado: {} ({})", book.title, book.id);
    Ok(book)
}

fn list(library: &Path) -> CliResult<()> {
    let books = open_store(library)?.get_all()?;
    if books.is_empty() {
        println!("La biblioteca está vacía");
    }
    for book in books {
        println!(
            "{}  {}  ({} capítulos{})",
            book.id,
            book.title,
            book.spine.len(),
            if book.is_vertical { ", vertical" } else { "" }
        );
    }
    Ok(())
}

fn show_info(library: &Path, file: &Path) -> CliResult<()> {
    let config = ReaderConfig::load(library)?;
    let book = parse_epub(file, &config)?;
    let metadata = &book.metadata;

    println!("Archivo: {}", file.display());
    println!("Título: {}", book.title);
    if let Some(creator) = &metadata.creator {
        println!("Autor: {creator}");
    }
    if let Some(language) = &metadata.language {
        println!("Idioma: {language}");
    }
    if let Some(publisher) = &metadata.publisher {
        println!("Editor: {publisher}");
    }
    if let Some(cover) = &book.cover {
        println!("Portada: {} ({})", cover.path, cover.media_type);
    }
    println!("Escritura vertical: {}", if book.is_vertical { "sí" } else { "no" });
    println!("Capítulos: {}", book.spine.len());
    println!("Índice:");

    let width = termwidth();
    for (i, (depth, entry)) in flatten_toc(&book.toc).into_iter().enumerate() {
        let indent = format!("{:>5}  {}", format!("{}.", i + 1), "  ".repeat(depth));
        let hanging = " ".repeat(indent.chars().count());
        let options = Options::new(width).initial_indent(&indent).subsequent_indent(&hanging);
        println!("{}", textwrap::fill(&entry.label, options));
    }
    Ok(())
}

fn read(library: &Path, book_ref: &str) -> CliResult<()> {
    let config = ReaderConfig::load(library)?;
    let store = open_store(library)?;

    let book = match store.get_by_id(book_ref)? {
        Some(book) => book,
        None => {
            let path = Path::new(book_ref);
            if !path.exists() {
                return Err(EpubError::Store(format!("no hay ningún libro '{}' en la biblioteca", book_ref)).into());
            }
            let file = fs::canonicalize(path)?;
            // Ya importado desde la misma ruta: se reutiliza
            let existing = store.get_all()?.into_iter().find(|book| book.archive_path == file);
            match existing {
                Some(book) => book,
                None => import(library, &file)?,
            }
        }
    };

    if book.spine.is_empty() {
        warn!("'{}' no tiene capítulos en el spine", book.title);
        return Err(EpubError::StructureIncomplete("el EPUB no contiene capítulos en el spine".to_string()).into());
    }
    ui::start_ui(book, config.page_margin)?;
    Ok(())
}
