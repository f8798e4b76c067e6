//! Хранилище бинарных артефактов (blob store)
//!
//! Ошибки ввода-вывода возвращаются как есть, повторные попытки - забота реализации.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Счетчик для уникальных имен временных файлов
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub trait BlobStore: Send + Sync {
    fn read_blob(&self, name: &str) -> io::Result<Vec<u8>>;
    fn write_blob(&self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Блобы как файлы в локальной директории
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> io::Result<PathBuf> {
        let valid = !name.is_empty()
            && Path::new(name)
                .components()
                .all(|c| matches!(c, std::path::Component::Normal(_)));
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid blob name '{name}'"),
            ));
        }
        Ok(self.root.join(name))
    }

    fn write_file(tmp: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    }
}

impl BlobStore for FsBlobStore {
    fn read_blob(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.blob_path(name)?)
    }

    /// Запись через временный файл и rename, чтобы читатель не увидел половину блоба
    fn write_blob(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.blob_path(name)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        // Отдельный временный файл на каждую запись
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("blob");
        let tmp = path.with_file_name(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let written = Self::write_file(&tmp, bytes).and_then(|_| fs::rename(&tmp, &path));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }
}

/// Блобы в памяти процесса (тесты, запуск без диска)
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn read_blob(&self, name: &str) -> io::Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("blob '{name}' not found"))
            })
    }

    fn write_blob(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}
