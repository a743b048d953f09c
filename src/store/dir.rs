//! Filesystem-directory store: one file per entry.
//!
//! An entry lives at a path spelled from the lowercase hex of its encoded key. The hex is cut
//! into 128-character chunks: every full chunk but the last becomes a directory named `f<chunk>`
//! and the remainder the file `e<rest>`, which keeps names well under `NAME_MAX` for any key
//! length. Walking each level sorted by (chunk, file-before-directory) yields keys in byte
//! order. Values are staged in a uniquely named dot file and renamed into place; dot files are
//! never treated as entries.
use std::{
    fs,
    io::{ErrorKind, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use super::{OrderedStore, Store};
use crate::{
    codec::{ByteCodec, DecodeError},
    LapseError, LapseResult,
};

const FILE_MARKER: char = 'e';
const DIR_MARKER: char = 'f';
/// Hex characters per path component.
const CHUNK_LEN: usize = 128;

#[derive(Debug)]
pub struct DirStore<K, V> {
    root: PathBuf,
    // serializes writers in this process; directory pruning must not race a `set`
    writes: Mutex<()>,
    _phantom: PhantomData<fn() -> (K, V)>,
}

impl<K, V> DirStore<K, V> {
    /// Uses `root` as the table, creating it if needed.
    pub fn open(root: impl AsRef<Path>) -> LapseResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            writes: Mutex::new(()),
            _phantom: PhantomData,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hex of every stored key, in ascending order.
    fn entry_hexes(&self) -> LapseResult<Vec<String>> {
        let mut out = Vec::new();
        collect_level(&self.root, "", &mut out)?;
        Ok(out)
    }

    /// Removes directories left empty above `path`, stopping at the root.
    fn prune_above(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

fn collect_level(dir: &Path, prefix: &str, out: &mut Vec<String>) -> LapseResult<()> {
    let mut level: Vec<(String, bool)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(chunk) = name.strip_prefix(FILE_MARKER) {
            level.push((chunk.to_string(), false));
        } else if let Some(chunk) = name.strip_prefix(DIR_MARKER) {
            level.push((chunk.to_string(), true));
        }
    }
    // a file sorts before a directory with the same chunk: its key is a prefix of theirs
    level.sort_unstable();
    for (chunk, nested) in level {
        let hex = format!("{prefix}{chunk}");
        if nested {
            collect_level(&dir.join(format!("{DIR_MARKER}{chunk}")), &hex, out)?;
        } else {
            out.push(hex);
        }
    }
    Ok(())
}

impl<K: ByteCodec, V> DirStore<K, V> {
    fn path_of(&self, key: &K) -> PathBuf {
        let hex = hex::encode(key.encode_bytes());
        let mut path = self.root.clone();
        let mut rest = hex.as_str();
        while rest.len() > CHUNK_LEN {
            let (chunk, tail) = rest.split_at(CHUNK_LEN);
            path.push(format!("{DIR_MARKER}{chunk}"));
            rest = tail;
        }
        path.push(format!("{FILE_MARKER}{rest}"));
        path
    }

    fn decode_hex(hex: &str) -> LapseResult<K> {
        let raw = hex::decode(hex).map_err(|_| DecodeError::InvalidHex(hex.to_string()))?;
        Ok(K::decode_bytes(&raw)?)
    }
}

fn not_found_as(err: std::io::Error) -> LapseError {
    if err.kind() == ErrorKind::NotFound {
        LapseError::NotFound
    } else {
        err.into()
    }
}

impl<K: ByteCodec, V: ByteCodec> Store for DirStore<K, V> {
    type Key = K;
    type Value = V;

    fn get(&self, key: &K) -> LapseResult<V> {
        let raw = fs::read(self.path_of(key)).map_err(not_found_as)?;
        Ok(V::decode_bytes(&raw)?)
    }

    fn set(&self, key: K, value: V) -> LapseResult<()> {
        let target = self.path_of(&key);
        let _writes = self.writes.lock();
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut staging = NamedTempFile::new_in(&self.root)?;
        staging.write_all(&value.encode_bytes())?;
        staging.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }

    fn delete(&self, key: &K) -> LapseResult<()> {
        let path = self.path_of(key);
        let _writes = self.writes.lock();
        fs::remove_file(&path).map_err(not_found_as)?;
        self.prune_above(&path);
        Ok(())
    }

    fn delete_if_eq(&self, key: &K, expected: &V) -> LapseResult<bool> {
        let path = self.path_of(key);
        let _writes = self.writes.lock();
        match fs::read(&path) {
            Ok(raw) if raw == expected.encode_bytes() => {
                fs::remove_file(&path)?;
                self.prune_above(&path);
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn contains(&self, key: &K) -> LapseResult<bool> {
        Ok(self.path_of(key).try_exists()?)
    }

    fn len(&self) -> LapseResult<usize> {
        Ok(self.entry_hexes()?.len())
    }
}

impl<K: ByteCodec, V: ByteCodec> OrderedStore for DirStore<K, V> {
    fn iter_ascending(&self) -> LapseResult<Box<dyn Iterator<Item = LapseResult<K>> + '_>> {
        let hexes = self.entry_hexes()?;
        Ok(Box::new(hexes.into_iter().map(|hex| Self::decode_hex(&hex))))
    }
}
