//! Property tests: content survives any page size and any write chunking.

mod common;

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use common::{TEST_PASSWORD, memory_fs};
use oxvfs_core::crypto::PAGE_OVERHEAD;
use oxvfs_core::vfs::{KEY_CONFIG, KEY_CREDENTIAL, KEY_TREE};
use oxvfs_core::{BlobStore, FileSystem};
use proptest::prelude::*;

proptest! {
    // Every case derives a key, keep the count moderate
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_roundtrip_any_page_size_and_chunking(
        content in prop::collection::vec(any::<u8>(), 0..2048),
        page_size in 1usize..300,
        chunk in 1usize..700,
    ) {
        let (store, fs) = memory_fs(page_size);
        let mut handle = fs.create_file(&fs.root_id(), "f").unwrap();
        for piece in content.chunks(chunk) {
            handle.write_all(piece).unwrap();
        }
        handle.close().unwrap();

        let reopened = FileSystem::open(Arc::clone(&store), TEST_PASSWORD).unwrap();
        let mut out = Vec::new();
        reopened.open_by_path("/f", false).unwrap().read_to_end(&mut out).unwrap();
        prop_assert_eq!(&out, &content);
        prop_assert_eq!(reopened.stat("/f").unwrap().size, content.len() as u64);
    }

    #[test]
    fn test_page_chunking(
        len in 0usize..1500,
        page_size in 1usize..200,
    ) {
        let (store, fs) = memory_fs(page_size);
        let mut handle = fs.create_file(&fs.root_id(), "f").unwrap();
        handle.write_all(&vec![0x5a; len]).unwrap();
        handle.close().unwrap();

        let info = fs.stat("/f").unwrap();
        prop_assert_eq!(info.page_count, len.div_ceil(page_size));

        let mut sizes: Vec<usize> = store
            .keys()
            .iter()
            .filter(|k| ![KEY_TREE, KEY_CONFIG, KEY_CREDENTIAL].contains(&k.as_str()))
            .map(|k| store.get(k).unwrap().len() - PAGE_OVERHEAD)
            .collect();
        sizes.sort_unstable();

        if len > 0 {
            let tail = match len % page_size {
                0 => page_size,
                rem => rem,
            };
            let mut expected = vec![page_size; info.page_count - 1];
            expected.push(tail);
            expected.sort_unstable();
            prop_assert_eq!(sizes, expected);
        } else {
            prop_assert!(sizes.is_empty());
        }
    }

    #[test]
    fn test_seek_then_read_matches_slice(
        content in prop::collection::vec(any::<u8>(), 1..600),
        page_size in 1usize..64,
        start_frac in 0.0f64..=1.0,
    ) {
        let (_store, fs) = memory_fs(page_size);
        let mut handle = fs.create_file(&fs.root_id(), "f").unwrap();
        handle.write_all(&content).unwrap();
        handle.close().unwrap();

        let start = ((content.len() as f64) * start_frac) as usize;
        let mut reader = fs.open_by_path("/f", false).unwrap();
        reader.seek(SeekFrom::Start(start as u64)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        prop_assert_eq!(&out[..], &content[start..]);
    }
}
