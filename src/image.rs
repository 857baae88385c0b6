//! Locate and load the image artifact to be published

use crate::{error::*, Digest};
use oci_spec::image::{
    Descriptor, ImageIndex, ImageManifest, ImageManifestBuilder, MediaType, SCHEMA_VERSION,
};
use serde::Deserialize;
use std::{
    collections::HashMap,
    fs,
    io::Read,
    path::{Path, PathBuf},
};

/// Resolve `pattern` under `base` into exactly one file
pub fn resolve_glob(base: &Path, pattern: &str) -> Result<PathBuf> {
    let full = base.join(pattern);
    let full = full.to_str().ok_or_else(|| Error::InvalidGlob {
        pattern: pattern.to_string(),
        message: "Non UTF-8 path".to_string(),
    })?;
    let paths = glob::glob(full).map_err(|e| Error::InvalidGlob {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    let mut matches = Vec::new();
    for path in paths {
        matches.push(path.map_err(|e| Error::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?);
    }
    match matches.len() {
        0 => Err(Error::ArtifactNotFound(pattern.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::ArtifactAmbiguous {
            pattern: pattern.to_string(),
            matches,
        }),
    }
}

/// Image loaded on memory from an image tarball
///
/// Two tarball formats are accepted:
///
/// - oci-archive, a tarball of a directory in the form of [OCI Image Layout specification](https://github.com/opencontainers/image-spec/blob/v1.1.0/image-layout.md).
///   It must contain a single manifest. The manifest is kept as raw bytes and
///   pushed without re-serialization, so that the digest is the same on the
///   registry.
/// - `docker save` tarball, which lists the config and layer files in
///   `manifest.json`. An OCI image manifest is generated from them.
///
/// `index.json` takes precedence when a tarball contains both.
#[derive(Debug, Clone)]
pub struct Image {
    media_type: String,
    manifest_bytes: Vec<u8>,
    digest: Digest,
    /// Config blob followed by layers
    blobs: Vec<(Digest, Vec<u8>)>,
}

/// Entry of `manifest.json` in a `docker save` tarball
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DockerManifest {
    config: String,
    #[serde(default)]
    layers: Vec<String>,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

impl Image {
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ArtifactNotFound(path.display().to_string()));
        }
        log::info!("loading image from {}", path.display());
        Self::from_reader(fs::File::open(path)?)
    }

    pub fn from_reader(input: impl Read) -> Result<Self> {
        let mut ar = tar::Archive::new(input);
        let mut files: HashMap<String, Vec<u8>> = HashMap::new();
        for entry in ar.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry.path()?.to_string_lossy().to_string();
            let path = path.trim_start_matches("./").to_string();
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            files.insert(path, buf);
        }

        if files.contains_key("index.json") {
            Self::from_oci_layout(&files)
        } else if files.contains_key("manifest.json") {
            Self::from_docker_archive(&files)
        } else {
            Err(Error::MissingIndex)
        }
    }

    fn from_oci_layout(files: &HashMap<String, Vec<u8>>) -> Result<Self> {
        let index = get_file(files, "index.json")?;
        let index = ImageIndex::from_reader(index.as_slice())?;
        let descriptor = match index.manifests().as_slice() {
            [descriptor] => descriptor,
            manifests => return Err(Error::MultipleManifests(manifests.len())),
        };
        let expected = Digest::new(descriptor.digest())?;
        let manifest_bytes = get_blob(files, &expected)?;
        let digest = Digest::from_buf_sha256(&manifest_bytes);
        if digest != expected {
            return Err(Error::DigestMismatch {
                expected,
                actual: digest,
            });
        }
        let manifest = ImageManifest::from_reader(manifest_bytes.as_slice())?;

        let mut blobs = Vec::new();
        for desc in std::iter::once(manifest.config()).chain(manifest.layers().iter()) {
            let digest = Digest::new(desc.digest())?;
            let blob = get_blob(files, &digest)?;
            blobs.push((digest, blob));
        }

        Ok(Image {
            media_type: descriptor.media_type().to_string(),
            manifest_bytes,
            digest,
            blobs,
        })
    }

    fn from_docker_archive(files: &HashMap<String, Vec<u8>>) -> Result<Self> {
        let entries: Vec<DockerManifest> =
            serde_json::from_slice(&get_file(files, "manifest.json")?)?;
        let entry = match entries.as_slice() {
            [entry] => entry,
            entries => return Err(Error::MultipleManifests(entries.len())),
        };

        let config = get_file(files, &entry.config)?;
        let config_digest = Digest::from_buf_sha256(&config);
        let config_desc = Descriptor::new(
            MediaType::ImageConfig,
            config.len() as i64,
            config_digest.to_string(),
        );
        let mut blobs = vec![(config_digest, config)];

        let mut layers = Vec::new();
        for path in &entry.layers {
            let layer = get_file(files, path)?;
            let media_type = if layer.starts_with(&GZIP_MAGIC) {
                MediaType::ImageLayerGzip
            } else {
                MediaType::ImageLayer
            };
            let digest = Digest::from_buf_sha256(&layer);
            layers.push(Descriptor::new(
                media_type,
                layer.len() as i64,
                digest.to_string(),
            ));
            blobs.push((digest, layer));
        }

        let manifest = ImageManifestBuilder::default()
            .schema_version(SCHEMA_VERSION)
            .media_type(MediaType::ImageManifest)
            .config(config_desc)
            .layers(layers)
            .build()?;
        let mut manifest_bytes = Vec::new();
        manifest.to_writer(&mut manifest_bytes)?;
        let digest = Digest::from_buf_sha256(&manifest_bytes);
        log::debug!("generated manifest {} from manifest.json", digest);

        Ok(Image {
            media_type: MediaType::ImageManifest.to_string(),
            manifest_bytes,
            digest,
            blobs,
        })
    }

    /// Digest of the manifest, i.e. the image digest shown by registries
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn manifest_bytes(&self) -> &[u8] {
        &self.manifest_bytes
    }

    /// Config and layer blobs
    pub fn blobs(&self) -> impl Iterator<Item = (&Digest, &[u8])> {
        self.blobs.iter().map(|(d, b)| (d, b.as_slice()))
    }
}

fn get_file(files: &HashMap<String, Vec<u8>>, path: &str) -> Result<Vec<u8>> {
    files
        .get(path.trim_start_matches("./"))
        .cloned()
        .ok_or_else(|| Error::MissingFile(path.to_string()))
}

fn get_blob(files: &HashMap<String, Vec<u8>>, digest: &Digest) -> Result<Vec<u8>> {
    files
        .get(&digest.as_path())
        .cloned()
        .ok_or_else(|| Error::MissingBlob(digest.clone()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_dir() -> PathBuf {
        let dir = env::temp_dir().join(format!("imgpush-image-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn load_archive() -> Result<()> {
        let image = testing::image();
        let manifest = testing::manifest_json(b"{}", b"layer");
        assert_eq!(image.manifest_bytes(), manifest.as_bytes());
        assert_eq!(image.digest(), &Digest::from_buf_sha256(manifest.as_bytes()));
        assert_eq!(image.media_type(), "application/vnd.oci.image.manifest.v1+json");

        let blobs: Vec<_> = image.blobs().collect();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].0, &Digest::from_buf_sha256(b"{}"));
        assert_eq!(blobs[1].1, b"layer");
        Ok(())
    }

    #[test]
    fn missing_manifest() {
        let archive = testing::archive_with(
            b"{}",
            b"layer",
            Some("sha256:0000000000000000000000000000000000000000000000000000000000000000"),
        );
        assert!(matches!(
            Image::from_reader(archive.as_slice()),
            Err(Error::MissingBlob(_))
        ));
    }

    #[test]
    fn digest_mismatch() {
        let manifest = testing::manifest_json(b"{}", b"layer");
        let bogus = format!("sha256:{}", "a".repeat(64));
        let index = format!(
            r#"{{"schemaVersion":2,"manifests":[{{"mediaType":"application/vnd.oci.image.manifest.v1+json","digest":"{}","size":{}}}]}}"#,
            bogus,
            manifest.len()
        );
        let mut ar = tar::Builder::new(Vec::new());
        for (path, data) in [
            ("index.json".to_string(), index.as_bytes()),
            (Digest::new(&bogus).unwrap().as_path(), manifest.as_bytes()),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_cksum();
            ar.append_data(&mut header, path, data).unwrap();
        }
        let buf = ar.into_inner().unwrap();
        assert!(matches!(
            Image::from_reader(buf.as_slice()),
            Err(Error::DigestMismatch { .. })
        ));
    }

    #[test]
    fn load_docker_archive() -> Result<()> {
        let config = br#"{"architecture":"amd64","os":"linux"}"#;
        let gzipped = [0x1f, 0x8b, 0x08, 0x00];
        let archive = testing::docker_archive(config, &[&b"base layer"[..], &gzipped[..]]);
        let image = Image::from_reader(archive.as_slice())?;

        assert_eq!(image.media_type(), "application/vnd.oci.image.manifest.v1+json");
        assert_eq!(
            image.digest(),
            &Digest::from_buf_sha256(image.manifest_bytes())
        );
        let blobs: Vec<_> = image.blobs().collect();
        assert_eq!(blobs.len(), 3);
        assert_eq!(blobs[0].0, &Digest::from_buf_sha256(config));
        assert_eq!(blobs[1].1, b"base layer");

        let manifest = ImageManifest::from_reader(image.manifest_bytes())?;
        assert_eq!(manifest.config().media_type(), &MediaType::ImageConfig);
        assert_eq!(manifest.config().size(), config.len() as i64);
        let layers: Vec<_> = manifest.layers().iter().map(|d| d.media_type()).collect();
        assert_eq!(layers, [&MediaType::ImageLayer, &MediaType::ImageLayerGzip]);

        // Generated manifest is stable, so is the digest reported for the push
        let again = Image::from_reader(archive.as_slice())?;
        assert_eq!(again.digest(), image.digest());
        Ok(())
    }

    #[test]
    fn docker_archive_missing_layer() {
        let manifest = br#"[{"Config":"config.json","Layers":["abc/layer.tar"]}]"#;
        let mut ar = tar::Builder::new(Vec::new());
        for (path, data) in [("manifest.json", &manifest[..]), ("config.json", &b"{}"[..])] {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_cksum();
            ar.append_data(&mut header, path, data).unwrap();
        }
        let buf = ar.into_inner().unwrap();
        match Image::from_reader(buf.as_slice()) {
            Err(Error::MissingFile(path)) => assert_eq!(path, "abc/layer.tar"),
            res => panic!("unexpected: {:?}", res),
        }
    }

    #[test]
    fn docker_archive_with_many_images() {
        let manifest = br#"[{"Config":"a.json","Layers":[]},{"Config":"b.json","Layers":[]}]"#;
        let mut ar = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(manifest.len() as u64);
        header.set_cksum();
        ar.append_data(&mut header, "manifest.json", &manifest[..])
            .unwrap();
        let buf = ar.into_inner().unwrap();
        assert!(matches!(
            Image::from_reader(buf.as_slice()),
            Err(Error::MultipleManifests(2))
        ));
    }

    #[test]
    fn not_an_archive() {
        let mut ar = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(3);
        header.set_cksum();
        ar.append_data(&mut header, "foo", &b"bar"[..]).unwrap();
        let buf = ar.into_inner().unwrap();
        assert!(matches!(
            Image::from_reader(buf.as_slice()),
            Err(Error::MissingIndex)
        ));
    }

    #[test]
    fn glob() -> Result<()> {
        let dir = temp_dir();
        fs::create_dir_all(dir.join("image"))?;
        fs::write(dir.join("image/image.tar"), testing::archive())?;

        let path = resolve_glob(&dir, "image/*.tar")?;
        assert_eq!(path, dir.join("image/image.tar"));
        Image::from_path(&path)?;

        assert!(matches!(
            resolve_glob(&dir, "nothing/*.tar"),
            Err(Error::ArtifactNotFound(_))
        ));

        fs::write(dir.join("image/other.tar"), b"")?;
        match resolve_glob(&dir, "image/*.tar") {
            Err(Error::ArtifactAmbiguous { matches, .. }) => assert_eq!(matches.len(), 2),
            res => panic!("unexpected: {:?}", res),
        }

        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
