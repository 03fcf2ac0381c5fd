use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::{ChangeSet, TreeDiff};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::object::{Object, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::collections::BTreeMap;
use std::io::{BufRead, Cursor, Read, Write};
use std::path::{Path, PathBuf};

/// Content-addressed store of zlib-compressed objects under `objects/`
#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).is_file()
    }

    /// Store an object and return its id
    ///
    /// Storing content that is already present is a no-op.
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let object_content = object.serialize()?;
        let object_id = ObjectId::hash_bytes(&object_content);
        let object_path = self.path.join(object_id.to_path());

        if !object_path.exists() {
            let object_dir = object_path
                .parent()
                .with_context(|| format!("invalid object path {}", object_path.display()))?;
            std::fs::create_dir_all(object_dir).with_context(|| {
                format!("unable to create object directory {}", object_dir.display())
            })?;

            self.write_object(&object_path, object_content)?;
        }

        Ok(object_id)
    }

    /// Raw canonical bytes of an object, checked against its id
    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let object_path = self.path.join(object_id.to_path());
        if !object_path.is_file() {
            return Err(RepositoryError::ObjectNotFound(object_id.clone()).into());
        }

        let object_content = self.read_object(&object_path)?;

        let actual = ObjectId::hash_bytes(&object_content);
        if &actual != object_id {
            return Err(RepositoryError::ObjectCorrupt {
                expected: object_id.clone(),
                actual: actual.to_string(),
            }
            .into());
        }

        Ok(object_content)
    }

    pub fn object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        let (object_type, _) = self.parse_object_as_bytes(object_id)?;
        Ok(object_type)
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Option<Blob>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(Some(Blob::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    /// Content of an object that must be a blob
    pub fn load_blob_content(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let blob = self
            .parse_object_as_blob(object_id)?
            .with_context(|| format!("object {object_id} is not a blob"))?;

        Ok(blob.into_content())
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> anyhow::Result<Option<Tree>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Tree => Ok(Some(Tree::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Option<Commit>> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Commit => Ok(Some(Commit::deserialize(object_reader)?)),
            _ => Ok(None),
        }
    }

    /// Load an object that must be a commit
    pub fn load_commit(&self, object_id: &ObjectId) -> anyhow::Result<Commit> {
        self.parse_object_as_commit(object_id)?
            .with_context(|| format!("object {object_id} is not a commit"))
    }

    pub fn load_slim_commit(&self, object_id: &ObjectId) -> anyhow::Result<SlimCommit> {
        Ok(self.load_commit(object_id)?.to_slim(object_id.clone()))
    }

    /// Tree id behind a commit or tree id
    pub fn peel_to_tree(&self, object_id: &ObjectId) -> anyhow::Result<Tree> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Tree => Tree::deserialize(object_reader),
            ObjectType::Commit => {
                let commit = Commit::deserialize(object_reader)?;
                self.peel_to_tree(commit.tree_oid())
            }
            ObjectType::Blob => anyhow::bail!("object {object_id} is a blob, not a tree"),
        }
    }

    /// Every file reachable from a tree (or commit), keyed by its full path
    pub fn flatten_tree(
        &self,
        object_id: Option<&ObjectId>,
    ) -> anyhow::Result<BTreeMap<PathBuf, DatabaseEntry>> {
        let mut files = BTreeMap::new();

        if let Some(object_id) = object_id {
            let tree = self.peel_to_tree(object_id)?;
            self.collect_tree_files(tree, Path::new(""), &mut files)?;
        }

        Ok(files)
    }

    fn collect_tree_files(
        &self,
        tree: Tree,
        prefix: &Path,
        files: &mut BTreeMap<PathBuf, DatabaseEntry>,
    ) -> anyhow::Result<()> {
        for (name, entry) in tree.into_entries() {
            let path = prefix.join(name);

            if entry.is_tree() {
                let subtree = self.peel_to_tree(&entry.oid)?;
                self.collect_tree_files(subtree, &path, files)?;
            } else {
                files.insert(path, entry);
            }
        }

        Ok(())
    }

    /// File-level changes turning the `old` tree into the `new` one
    pub fn tree_diff(
        &self,
        old_oid: Option<&ObjectId>,
        new_oid: Option<&ObjectId>,
    ) -> anyhow::Result<ChangeSet> {
        let mut tree_diff = TreeDiff::new(self);
        tree_diff.compare_oids(old_oid, new_oid, Path::new(""))?;

        Ok(tree_diff.into_changes())
    }

    fn parse_object_as_bytes(
        &self,
        object_id: &ObjectId,
    ) -> anyhow::Result<(ObjectType, impl BufRead + use<>)> {
        let object_content = self.load(object_id)?;
        let mut object_reader = Cursor::new(object_content);

        let (object_type, _) = ObjectType::parse_header(&mut object_reader)
            .with_context(|| format!("invalid header in object {object_id}"))?;

        Ok((object_type, object_reader))
    }

    fn read_object(&self, object_path: &Path) -> anyhow::Result<Bytes> {
        let object_content = std::fs::read(object_path)
            .with_context(|| format!("unable to read object file {}", object_path.display()))?;

        Self::decompress(object_content.into())
    }

    fn write_object(&self, object_path: &Path, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .with_context(|| format!("invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .with_context(|| {
                format!("unable to open object file {}", temp_object_path.display())
            })?;

        file.write_all(&object_content).with_context(|| {
            format!("unable to write object file {}", temp_object_path.display())
        })?;
        file.sync_all()?;

        // a reader never sees a partially written object
        std::fs::rename(&temp_object_path, object_path)
            .with_context(|| format!("unable to rename object file to {}", object_path.display()))?;

        Ok(())
    }

    fn compress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&data)
            .context("unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("unable to finish compressing object content")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::EntryMode;
    use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
    use crate::artifacts::objects::commit::Author;
    use assert_fs::TempDir;
    use rstest::{fixture, rstest};

    #[fixture]
    fn objects_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn database(dir: &TempDir) -> Database {
        Database::new(dir.path().to_path_buf().into_boxed_path())
    }

    fn store_files(database: &Database, files: &[(&str, &str)]) -> ObjectId {
        let entries = files
            .iter()
            .map(|(path, content)| {
                let oid = database
                    .store(&Blob::new(Bytes::from(content.to_string())))
                    .unwrap();
                IndexEntry::new(
                    PathBuf::from(path),
                    oid,
                    EntryMetadata {
                        mode: EntryMode::default(),
                        ..Default::default()
                    },
                )
            })
            .collect::<Vec<_>>();

        let mut root = None;
        for tree in Tree::build(entries.iter()).unwrap() {
            root = Some(database.store(&tree).unwrap());
        }
        root.unwrap()
    }

    #[rstest]
    fn stored_blob_loads_back(objects_dir: TempDir) {
        let database = database(&objects_dir);
        let blob = Blob::new(Bytes::from_static(b"hello\n"));

        let oid = database.store(&blob).unwrap();

        assert_eq!(oid.as_ref(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert!(database.contains(&oid));
        assert_eq!(database.parse_object_as_blob(&oid).unwrap(), Some(blob));
        assert_eq!(database.parse_object_as_tree(&oid).unwrap(), None);
    }

    #[rstest]
    fn storing_twice_is_idempotent(objects_dir: TempDir) {
        let database = database(&objects_dir);
        let blob = Blob::new(Bytes::from_static(b"same"));

        let first = database.store(&blob).unwrap();
        let second = database.store(&blob).unwrap();

        assert_eq!(first, second);
        let fan_out = objects_dir.path().join(&first.as_ref()[..2]);
        assert_eq!(std::fs::read_dir(fan_out).unwrap().count(), 1);
    }

    #[rstest]
    fn missing_object_is_reported(objects_dir: TempDir) {
        let database = database(&objects_dir);
        let oid = ObjectId::hash_bytes(b"never stored");

        let err = database.load(&oid).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RepositoryError>(),
            Some(RepositoryError::ObjectNotFound(_))
        ));
    }

    #[rstest]
    fn tampered_object_is_corrupt(objects_dir: TempDir) {
        let database = database(&objects_dir);
        let oid = database
            .store(&Blob::new(Bytes::from_static(b"original")))
            .unwrap();
        let other = Database::compress(Bytes::from_static(b"blob 8\0tampered")).unwrap();
        std::fs::write(objects_dir.path().join(oid.to_path()), other).unwrap();

        let err = database.load(&oid).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RepositoryError>(),
            Some(RepositoryError::ObjectCorrupt { .. })
        ));
    }

    #[rstest]
    fn flatten_tree_lists_nested_files(objects_dir: TempDir) {
        let database = database(&objects_dir);
        let root = store_files(&database, &[("a.txt", "a"), ("dir/b.txt", "b"), ("dir/sub/c.txt", "c")]);

        let files = database.flatten_tree(Some(&root)).unwrap();

        pretty_assertions::assert_eq!(
            files.keys().cloned().collect::<Vec<_>>(),
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("dir/b.txt"),
                PathBuf::from("dir/sub/c.txt")
            ]
        );
    }

    #[rstest]
    fn commit_peels_to_its_tree(objects_dir: TempDir) {
        let database = database(&objects_dir);
        let root = store_files(&database, &[("a.txt", "a")]);
        let author = Author::new(
            "Jane".into(),
            "jane@example.com".into(),
            chrono::DateTime::parse_from_rfc2822("Sun, 1 Jan 2023 12:00:00 +0000").unwrap(),
        );
        let commit_oid = database
            .store(&Commit::new(vec![], root.clone(), author, "first".into()))
            .unwrap();

        let files = database.flatten_tree(Some(&commit_oid)).unwrap();
        let slim = database.load_slim_commit(&commit_oid).unwrap();

        assert_eq!(files.len(), 1);
        assert!(slim.parents.is_empty());
        assert_eq!(slim.oid, commit_oid);
    }

    #[rstest]
    fn tree_diff_reports_file_changes(objects_dir: TempDir) {
        let database = database(&objects_dir);
        let old = store_files(&database, &[("keep.txt", "k"), ("edit.txt", "v1"), ("gone/x.txt", "x")]);
        let new = store_files(&database, &[("keep.txt", "k"), ("edit.txt", "v2"), ("new/y.txt", "y")]);

        let changes = database.tree_diff(Some(&old), Some(&new)).unwrap();

        let summary = changes
            .iter()
            .map(|(path, change)| (path.clone(), change.status_char()))
            .collect::<Vec<_>>();
        pretty_assertions::assert_eq!(
            summary,
            vec![
                (PathBuf::from("edit.txt"), 'M'),
                (PathBuf::from("gone/x.txt"), 'D'),
                (PathBuf::from("new/y.txt"), 'A'),
            ]
        );
    }
}
