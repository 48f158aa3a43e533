//! # Hash-Array
//!
//! An ordered, growable array of independent key/value maps that can be
//! copied, cloned and persisted as a unit.
//!
//! A [`HashArray`] is a handle onto shared storage. [`HashArray::share`] hands
//! out another handle onto the same storage, the way a peer obtains the array
//! through a property exchange. Dropping a handle (or `free(false)`) only
//! releases that handle; `free(true)` destroys the storage for every handle,
//! after which all of them report `InvalidHandle`.
//!
//! Every accessor returns owned copies. Callers never hold references into
//! the storage.
//!
//! ## Persisted Layout
//! ```text
//! [Magic(4) "LPHA"] [Version(1)] [Identity: Length(4) bytes]
//! [MapCount(4)] { [EntryCount(4)] { [Key: Length(4) UTF-8] [Tag(1)] [Payload] } }
//! ```
//!
//! ## Sizing Calls
//! `key_count`/`keys` and `render_len`/`render` return identical results as
//! long as the array is not mutated in between. Mutating from another thread
//! between the two calls is a caller error; nothing here guards against it.

use bytes::{BufMut, BytesMut};
use std::fmt::Write as _;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument};

use crate::core::codec::{self, ValueCodec};
use crate::core::value::{Value, ValueKind};
use crate::error::{constants, LipcError, Result};

/// Magic bytes opening a persisted hash-array ("LPHA")
pub const HASHARRAY_MAGIC: [u8; 4] = [0x4C, 0x50, 0x48, 0x41];

/// Current persisted layout version
pub const HASHARRAY_VERSION: u8 = 1;

/// Length of the identity tag assigned to new arrays
pub const IDENTITY_LEN: usize = 8;

/// Smallest possible encoded map: its entry count
const MIN_MAP_LEN: usize = 4;

/// Smallest possible encoded entry: key length, tag, 4-byte payload
const MIN_ENTRY_LEN: usize = 4 + 1 + 4;

/// One map of the array. Insertion-ordered, unique keys.
type Map = Vec<(String, Value)>;

#[derive(Debug, Clone, Default)]
struct ArrayState {
    /// Opaque tag carried through clone and persistence, never interpreted
    identity: Vec<u8>,
    maps: Vec<Map>,
}

impl ArrayState {
    fn map(&self, index: usize) -> Result<&Map> {
        self.maps.get(index).ok_or(LipcError::NoSuchSource)
    }

    fn map_mut(&mut self, index: usize) -> Result<&mut Map> {
        self.maps.get_mut(index).ok_or(LipcError::NoSuchSource)
    }

    fn lookup(&self, index: usize, key: &str) -> Result<&Value> {
        self.map(index)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or(LipcError::NoSuchParam)
    }
}

#[derive(Debug)]
struct SharedStorage {
    state: RwLock<ArrayState>,
    destroyed: AtomicBool,
}

/// Handle onto a shared hash-array
#[derive(Debug)]
pub struct HashArray {
    storage: Arc<SharedStorage>,
}

impl Default for HashArray {
    fn default() -> Self {
        Self::new()
    }
}

impl HashArray {
    /// Create an empty array with zero maps and a fresh identity tag
    pub fn new() -> Self {
        let identity = rand::random::<u64>().to_be_bytes().to_vec();
        Self::from_state(ArrayState {
            identity,
            maps: Vec::new(),
        })
    }

    fn from_state(state: ArrayState) -> Self {
        Self {
            storage: Arc::new(SharedStorage {
                state: RwLock::new(state),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Another handle onto the same storage
    pub fn share(&self) -> HashArray {
        HashArray {
            storage: Arc::clone(&self.storage),
        }
    }

    /// Whether two handles refer to the same storage
    pub fn same_storage(&self, other: &HashArray) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Whether the underlying storage has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.storage.destroyed.load(Ordering::Acquire)
    }

    /// Release this handle.
    ///
    /// With `destroy`, the shared storage is invalidated for every handle.
    /// Destroy is single-shot: destroying already destroyed storage fails
    /// with `InvalidHandle`.
    #[instrument(skip(self), level = "debug")]
    pub fn free(self, destroy: bool) -> Result<()> {
        if !destroy {
            return Ok(());
        }
        if self.storage.destroyed.swap(true, Ordering::AcqRel) {
            return Err(LipcError::InvalidHandle);
        }
        let mut state = self
            .storage
            .state
            .write()
            .map_err(|_| LipcError::internal(constants::ERR_HASHARRAY_LOCK))?;
        *state = ArrayState::default();
        debug!("Hash-array storage destroyed");
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&ArrayState) -> Result<T>) -> Result<T> {
        let state = self
            .storage
            .state
            .read()
            .map_err(|_| LipcError::internal(constants::ERR_HASHARRAY_LOCK))?;
        if self.is_destroyed() {
            return Err(LipcError::InvalidHandle);
        }
        f(&state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut ArrayState) -> Result<T>) -> Result<T> {
        let mut state = self
            .storage
            .state
            .write()
            .map_err(|_| LipcError::internal(constants::ERR_HASHARRAY_LOCK))?;
        if self.is_destroyed() {
            return Err(LipcError::InvalidHandle);
        }
        f(&mut state)
    }

    /// Copy of the opaque identity tag
    pub fn identity(&self) -> Result<Vec<u8>> {
        self.read(|state| Ok(state.identity.clone()))
    }

    /// Number of maps in the array
    pub fn hash_count(&self) -> Result<usize> {
        self.read(|state| Ok(state.maps.len()))
    }

    /// Append an empty map and return its index
    pub fn add_hash(&self) -> Result<usize> {
        self.write(|state| {
            state.maps.push(Map::new());
            Ok(state.maps.len() - 1)
        })
    }

    /// Number of keys in the map at `index`
    pub fn key_count(&self, index: usize) -> Result<usize> {
        self.read(|state| Ok(state.map(index)?.len()))
    }

    /// Copies of the keys of the map at `index`, in insertion order
    pub fn keys(&self, index: usize) -> Result<Vec<String>> {
        self.read(|state| Ok(state.map(index)?.iter().map(|(k, _)| k.clone()).collect()))
    }

    /// Copies of all entries of the map at `index`, in insertion order
    pub fn entries(&self, index: usize) -> Result<Vec<(String, Value)>> {
        self.read(|state| Ok(state.map(index)?.clone()))
    }

    /// Kind and size of the value stored under `key`.
    ///
    /// `NoSuchSource` for an out-of-range index, `NoSuchParam` for a missing key.
    pub fn check_key(&self, index: usize, key: &str) -> Result<(ValueKind, usize)> {
        self.read(|state| {
            let value = state.lookup(index, key)?;
            Ok((value.kind(), value.size_of()))
        })
    }

    /// Copy of the value stored under `key`, whatever its kind
    pub fn get(&self, index: usize, key: &str) -> Result<Value> {
        self.read(|state| state.lookup(index, key).cloned())
    }

    /// Store `value` under `key`, replacing any previous value of any kind
    pub fn put(&self, index: usize, key: &str, value: Value) -> Result<()> {
        self.write(|state| {
            let map = state.map_mut(index)?;
            match map.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value,
                None => map.push((key.to_string(), value)),
            }
            Ok(())
        })
    }

    fn get_typed<T>(
        &self,
        index: usize,
        key: &str,
        expected: ValueKind,
        extract: impl FnOnce(&Value) -> Option<T>,
    ) -> Result<T> {
        self.read(|state| {
            let value = state.lookup(index, key)?;
            extract(value).ok_or_else(|| {
                LipcError::invalid_arg(format!(
                    "key {key:?} holds {}, not {expected}",
                    value.kind()
                ))
            })
        })
    }

    pub fn get_int(&self, index: usize, key: &str) -> Result<i32> {
        self.get_typed(index, key, ValueKind::Integer, Value::as_int)
    }

    pub fn put_int(&self, index: usize, key: &str, value: i32) -> Result<()> {
        self.put(index, key, Value::Integer(value))
    }

    pub fn get_string(&self, index: usize, key: &str) -> Result<String> {
        self.get_typed(index, key, ValueKind::Text, |v| {
            v.as_text().map(str::to_string)
        })
    }

    pub fn put_string(&self, index: usize, key: &str, value: &str) -> Result<()> {
        self.put(index, key, Value::Text(value.to_string()))
    }

    pub fn get_blob(&self, index: usize, key: &str) -> Result<Vec<u8>> {
        self.get_typed(index, key, ValueKind::Blob, |v| v.as_blob().map(<[u8]>::to_vec))
    }

    pub fn put_blob(&self, index: usize, key: &str, value: &[u8]) -> Result<()> {
        self.put(index, key, Value::Blob(value.to_vec()))
    }

    /// Replace the content of `self` with a deep copy of `src`.
    ///
    /// The identity tag of `self` is kept.
    pub fn copy_from(&self, src: &HashArray) -> Result<()> {
        if self.same_storage(src) {
            return self.read(|_| Ok(()));
        }
        let maps = src.read(|state| Ok(state.maps.clone()))?;
        self.write(|state| {
            state.maps = maps;
            Ok(())
        })
    }

    /// Deep-copy the map at `src_index` of `src` into `dest_index` of `self`.
    ///
    /// `dest_index == hash_count()` appends; a smaller index overwrites.
    pub fn copy_hash(&self, dest_index: usize, src: &HashArray, src_index: usize) -> Result<()> {
        let map = src.read(|state| Ok(state.map(src_index)?.clone()))?;
        self.write(|state| {
            if dest_index == state.maps.len() {
                state.maps.push(map);
            } else {
                *state.map_mut(dest_index)? = map;
            }
            Ok(())
        })
    }

    /// A new, independent array with the same content and identity tag
    pub fn deep_clone(&self) -> Result<HashArray> {
        let state = self.read(|state| Ok(state.clone()))?;
        Ok(HashArray::from_state(state))
    }

    /// Serialize the whole array
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.read(|state| {
            let mut buf = BytesMut::with_capacity(64);
            buf.put_slice(&HASHARRAY_MAGIC);
            buf.put_u8(HASHARRAY_VERSION);
            codec::put_bytes(&mut buf, &state.identity);
            buf.put_u32(state.maps.len() as u32);
            for map in &state.maps {
                buf.put_u32(map.len() as u32);
                for (key, value) in map {
                    codec::put_bytes(&mut buf, key.as_bytes());
                    buf.put_u8(value.kind().tag());
                    ValueCodec::encode_into(value, &mut buf);
                }
            }
            Ok(buf.to_vec())
        })
    }

    /// Deserialize an array. Any malformation is `CorruptData`.
    pub fn from_bytes(bytes: &[u8]) -> Result<HashArray> {
        let mut src = bytes;
        codec::ensure_remaining(src, HASHARRAY_MAGIC.len() + 1)?;
        if src[..4] != HASHARRAY_MAGIC {
            return Err(LipcError::CorruptData(
                constants::ERR_INVALID_MAGIC.to_string(),
            ));
        }
        src = &src[4..];
        let version = codec::get_u8(&mut src)?;
        if version != HASHARRAY_VERSION {
            return Err(LipcError::CorruptData(format!(
                "Unsupported hash-array version: {version}"
            )));
        }

        let identity = codec::get_bytes(&mut src)?;
        let map_count = codec::get_u32(&mut src)? as usize;
        ensure_plausible(map_count, MIN_MAP_LEN, src.len())?;

        let mut maps = Vec::with_capacity(map_count);
        for _ in 0..map_count {
            let entry_count = codec::get_u32(&mut src)? as usize;
            ensure_plausible(entry_count, MIN_ENTRY_LEN, src.len())?;

            let mut map = Map::with_capacity(entry_count);
            for _ in 0..entry_count {
                let key = codec::get_text(&mut src)?;
                let tag = codec::get_u8(&mut src)?;
                let kind = ValueKind::from_tag(tag).ok_or_else(|| {
                    LipcError::CorruptData(format!("Unknown value tag: {tag:#04x}"))
                })?;
                let value = ValueCodec::decode_from(&mut src, kind)?;
                if map.iter().any(|(k, _)| *k == key) {
                    return Err(LipcError::CorruptData(format!("Duplicate key: {key:?}")));
                }
                map.push((key, value));
            }
            maps.push(map);
        }

        if !src.is_empty() {
            return Err(LipcError::CorruptData(
                constants::ERR_TRAILING_BYTES.to_string(),
            ));
        }

        Ok(HashArray::from_state(ArrayState { identity, maps }))
    }

    /// Write the serialized array to `writer`
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a serialized array from `reader` until end of stream
    pub fn restore<R: Read>(mut reader: R) -> Result<HashArray> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Length in bytes of [`HashArray::render`]'s output
    pub fn render_len(&self) -> Result<usize> {
        self.render().map(|s| s.len())
    }

    /// Deterministic human-readable rendering of the array.
    ///
    /// Intended for tools and snapshot tests, not for parsing.
    pub fn render(&self) -> Result<String> {
        self.read(|state| {
            let mut out = String::new();
            // Writing into a String cannot fail
            let _ = write!(out, "HashArray(identity=");
            for byte in &state.identity {
                let _ = write!(out, "{byte:02x}");
            }
            let _ = writeln!(out, ", hashes={})", state.maps.len());
            for (index, map) in state.maps.iter().enumerate() {
                let _ = write!(out, "[{index}] {{");
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{key:?}: {value}");
                }
                out.push_str("}\n");
            }
            Ok(out)
        })
    }
}

/// Reject element counts that could not possibly fit in the remaining input
fn ensure_plausible(count: usize, min_len: usize, remaining: usize) -> Result<()> {
    match count.checked_mul(min_len) {
        Some(needed) if needed <= remaining => Ok(()),
        _ => Err(LipcError::CorruptData(format!(
            "Element count {count} exceeds remaining input"
        ))),
    }
}
