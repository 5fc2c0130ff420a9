use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use elsa::FrozenVec;
use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(NonZeroUsize);

/// Owns the contents of every loaded file. Files are never unloaded.
#[derive(Default)]
pub struct SourceBuffer(FrozenVec<String>);

impl SourceBuffer {
    pub fn new() -> Self {
        Self(FrozenVec::new())
    }
}

pub struct Source<'buf> {
    buf: &'buf SourceBuffer,
    files: Vec<SourceFile<'buf>>,
}

#[derive(Debug)]
pub struct SourceFile<'buf> {
    id: SourceId,
    path: PathBuf,
    text: &'buf str,
}

impl<'buf> Source<'buf> {
    /// Takes a unique borrow so that no other `Source` pushes to the same buffer.
    pub fn new(buf: &'buf mut SourceBuffer) -> Self {
        Self {
            buf: &*buf,
            files: Vec::new(),
        }
    }

    pub fn load_from_string(&mut self, path: PathBuf, text: String) -> SourceId {
        let idx = self.files.len();
        debug_assert_eq!(self.buf.0.len(), idx);
        let id = SourceId(NonZeroUsize::MIN.saturating_add(idx));

        self.buf.0.push(text);
        let text: &'buf str = &self.buf.0[idx];

        self.files.push(SourceFile { id, path, text });

        id
    }

    pub fn load(&mut self, path: PathBuf) -> io::Result<SourceId> {
        let text = fs::read_to_string(&path)?;

        Ok(self.load_from_string(path, text))
    }

    pub fn get(&self, id: SourceId) -> Option<&SourceFile<'buf>> {
        self.files.get(id.0.get() - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile<'buf>> {
        self.files.iter()
    }
}

impl<'buf> SourceFile<'buf> {
    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &'buf str {
        self.text
    }
}
