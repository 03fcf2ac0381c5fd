//! Directory snapshot objects
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>` where each entry is
//! `<octal mode> <name>\0<20-byte id>`.
//!
//! Entries are ordered the way git orders them: a subtree sorts as if its name
//! carried a trailing `/`. The map key keeps that slash for directories so the
//! `BTreeMap` order is the serialization order; it is trimmed on the way out.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, pack_with_header};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Component;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, DatabaseEntry>,
}

/// Intermediate nesting used while grouping flat index paths into directories
#[derive(Debug, Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNodeEntry>,
}

#[derive(Debug)]
enum TreeNodeEntry {
    File(DatabaseEntry),
    Directory(TreeNode),
}

impl TreeNode {
    fn insert(&mut self, components: &[String], entry: DatabaseEntry) -> anyhow::Result<()> {
        match components {
            [] => anyhow::bail!("cannot insert an entry with an empty path"),
            [name] => {
                self.children
                    .insert(name.clone(), TreeNodeEntry::File(entry));
                Ok(())
            }
            [dir, rest @ ..] => {
                let child = self
                    .children
                    .entry(dir.clone())
                    .or_insert_with(|| TreeNodeEntry::Directory(TreeNode::default()));

                match child {
                    TreeNodeEntry::Directory(node) => node.insert(rest, entry),
                    TreeNodeEntry::File(_) => {
                        anyhow::bail!("'{dir}' is tracked both as a file and as a directory")
                    }
                }
            }
        }
    }

    // children are emitted before their parent so that every stored tree only
    // references objects that already exist
    fn materialize(self, trees: &mut Vec<Tree>) -> anyhow::Result<ObjectId> {
        let mut tree = Tree::default();

        for (name, child) in self.children {
            match child {
                TreeNodeEntry::File(entry) => tree.insert(name, entry),
                TreeNodeEntry::Directory(node) => {
                    let oid = node.materialize(trees)?;
                    tree.insert(name, DatabaseEntry::new(oid, EntryMode::Directory));
                }
            }
        }

        let oid = tree.object_id()?;
        trees.push(tree);

        Ok(oid)
    }
}

impl Tree {
    /// Group flat index entries into nested trees
    ///
    /// Returns every tree of the hierarchy, subtrees first and the root last, so
    /// storing them in order never leaves a dangling reference.
    pub fn build<'e>(entries: impl IntoIterator<Item = &'e IndexEntry>) -> anyhow::Result<Vec<Tree>> {
        let mut root = TreeNode::default();

        for entry in entries {
            let components = entry
                .name
                .components()
                .map(|component| match component {
                    Component::Normal(name) => name
                        .to_str()
                        .map(str::to_string)
                        .with_context(|| format!("non UTF-8 path {:?}", entry.name)),
                    _ => Err(anyhow::anyhow!("unexpected path component in {:?}", entry.name)),
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            root.insert(
                &components,
                DatabaseEntry::new(entry.oid.clone(), entry.metadata.mode),
            )?;
        }

        let mut trees = Vec::new();
        root.materialize(&mut trees)?;

        Ok(trees)
    }

    pub fn insert(&mut self, name: String, entry: DatabaseEntry) {
        let key = if entry.is_tree() {
            format!("{name}/")
        } else {
            name
        };
        self.entries.insert(key, entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &DatabaseEntry)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.trim_end_matches('/'), entry))
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, DatabaseEntry)> {
        self.entries.into_iter().map(|(mut name, entry)| {
            if entry.is_tree() {
                name.pop();
            }
            (name, entry)
        })
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut payload = Vec::new();

        for (name, entry) in self.entries() {
            write!(payload, "{} {}\0", entry.mode.as_str(), name)?;
            entry.oid.write_h40_to(&mut payload)?;
        }

        pack_with_header(self.object_type(), &payload)
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut tree = Tree::default();

        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            if reader.read_until(b' ', &mut mode_bytes)? == 0 {
                break;
            }
            if mode_bytes.pop() != Some(b' ') {
                anyhow::bail!("unexpected EOF in tree entry mode");
            }
            let mode = EntryMode::from_octal_str(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                anyhow::bail!("unexpected EOF in tree entry name");
            }
            let name = std::str::from_utf8(&name_bytes)?.to_owned();

            let oid =
                ObjectId::read_h40_from(&mut reader).context("unexpected EOF in tree entry id")?;

            tree.insert(name, DatabaseEntry::new(oid, mode));
        }

        Ok(tree)
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}
