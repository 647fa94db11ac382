use bytes::Bytes;
use indexmap::IndexMap;

/// Everything one firmware run installs.
///
/// Lives only for the duration of that run.
#[derive(Debug, Clone, Default)]
pub struct FirmwareAssets {
    /// File name of the binary, for progress messages.
    pub binary_name: String,
    pub binary: Bytes,
    /// Companion source files in upload order.
    pub source_files: IndexMap<String, Bytes>,
}

impl FirmwareAssets {
    /// Total payload size in bytes.
    pub fn total_len(&self) -> usize {
        self.binary.len() + self.source_files.values().map(Bytes::len).sum::<usize>()
    }
}

/// Last path segment of a URL, falling back to `fallback`.
pub(crate) fn file_name_of(url: &url::Url, fallback: &str) -> String {
    url.path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .map_or_else(|| fallback.to_owned(), ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_from_url() {
        let url = url::Url::parse("http://micropython.org/resources/firmware/esp32-1.10.bin")
            .expect("url");
        assert_eq!(file_name_of(&url, "esp32.bin"), "esp32-1.10.bin");

        let bare = url::Url::parse("http://micropython.org/").expect("url");
        assert_eq!(file_name_of(&bare, "esp32.bin"), "esp32.bin");
    }

    #[test]
    fn total_len_counts_everything() {
        let mut assets = FirmwareAssets {
            binary_name: "esp32.bin".into(),
            binary: Bytes::from_static(&[0u8; 16]),
            source_files: IndexMap::new(),
        };
        assets.source_files.insert("main.py".into(), Bytes::from_static(b"pass"));
        assert_eq!(assets.total_len(), 20);
    }
}
