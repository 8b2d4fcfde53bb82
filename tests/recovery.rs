//! End-to-end scenarios exercising the slice-store, the recovery engine,
//! and the sender's checksum/XOR helpers together, the way a real transfer
//! would populate them -- without ever touching a socket.

mod integration {
    mod end_to_end {
        use std::fs;
        use std::io::Write;

        use datadiode::constants::*;
        use datadiode::fountain;
        use datadiode::recovery::{recover, RecoveryConfig};
        use datadiode::sender::get_checksum;
        use datadiode::store::{self, StorePaths};

        /// Write `data` into a fresh slice-store under `dir`, delivering every
        /// clear slice whose index is NOT in `drop_clear` and every xor group
        /// whose index is NOT in `drop_xor`. Mirrors what a lossy receiver
        /// would have on disk after one transfer.
        fn seed_store(
            dir: &std::path::Path,
            file_id: &str,
            data: &[u8],
            xor_group_size: u32,
            drop_clear: &[u32],
            drop_xor: &[u32],
        ) -> StorePaths {
            let file_size = data.len() as u32;
            let slices = store::slice_count(file_size, xor_group_size);
            let paths = StorePaths::new(dir, file_id);

            let mut tmp = tempfile::NamedTempFile::new().unwrap();
            tmp.write_all(data).unwrap();
            tmp.flush().unwrap();
            let mut source = fs::File::open(tmp.path()).unwrap();
            let checksum = get_checksum(&mut source, slices);

            let mut file_id_bytes = [0u8; FILEIDLEN];
            let n = file_id.as_bytes().len().min(FILEIDLEN);
            file_id_bytes[..n].copy_from_slice(&file_id.as_bytes()[..n]);
            store::write_checksum_header_if_absent(&paths.checksum, &file_id_bytes, file_size, &checksum).unwrap();

            let mut clears = Vec::with_capacity(slices as usize);
            for i in 0..slices {
                let mut buf = [0u8; DATALEN];
                let start = i as usize * DATALEN;
                for j in 0..DATALEN {
                    buf[j] = data.get(start + j).copied().unwrap_or(0);
                }
                clears.push(buf);
            }

            let index = fountain::build_permutation(slices, FOUNTAIN_SEED);

            for i in 0..slices {
                if drop_clear.contains(&i) {
                    continue;
                }
                store::write_data_slice(&paths.clear_data, i, &clears[i as usize]).unwrap();
                store::mark_present(&paths.clear_list, i).unwrap();
            }
            for g in 0..slices {
                if drop_xor.contains(&g) {
                    continue;
                }
                let mut value = [0u8; DATALEN];
                for k in 0..xor_group_size {
                    let member = index[((g + k) % slices) as usize];
                    for (v, c) in value.iter_mut().zip(clears[member as usize].iter()) {
                        *v ^= c;
                    }
                }
                store::write_data_slice(&paths.xor_data, g, &value).unwrap();
                store::mark_present(&paths.xor_list, g).unwrap();
            }

            paths
        }

        #[test]
        fn zero_size_file_recovers_to_an_empty_canonical_output() {
            let dir = tempfile::tempdir().unwrap();
            seed_store(dir.path(), "empty.bin", &[], DEFAULT_XOR_GROUP_SIZE, &[], &[]);

            let config = RecoveryConfig {
                input_folder: dir.path().to_path_buf(),
                file_basename: "empty.bin".to_string(),
                xor_group_size: DEFAULT_XOR_GROUP_SIZE,
            };
            assert!(recover(&config).unwrap());
            assert_eq!(fs::read(dir.path().join("empty.bin")).unwrap(), Vec::<u8>::new());
        }

        #[test]
        fn single_group_file_with_full_delivery_recovers_unchanged() {
            let dir = tempfile::tempdir().unwrap();
            let data: Vec<u8> = (0..(DATALEN * 2)).map(|i| (i % 211) as u8).collect();
            seed_store(dir.path(), "small.bin", &data, 4, &[], &[]);

            let config = RecoveryConfig {
                input_folder: dir.path().to_path_buf(),
                file_basename: "small.bin".to_string(),
                xor_group_size: 4,
            };
            assert!(recover(&config).unwrap());
            assert_eq!(fs::read(dir.path().join("small.bin")).unwrap(), data);
        }

        #[test]
        fn one_missing_slice_per_group_is_recovered_via_its_parity() {
            let dir = tempfile::tempdir().unwrap();
            let data: Vec<u8> = (0..(DATALEN * 8)).map(|i| (i % 181) as u8).collect();
            // slices == xor_group_size here (8), so every group spans every
            // slot: dropping one clear slice leaves every group solvable.
            seed_store(dir.path(), "mid.bin", &data, 8, &[3], &[]);

            let config = RecoveryConfig {
                input_folder: dir.path().to_path_buf(),
                file_basename: "mid.bin".to_string(),
                xor_group_size: 8,
            };
            assert!(recover(&config).unwrap());
            assert_eq!(fs::read(dir.path().join("mid.bin")).unwrap(), data);
        }

        #[test]
        fn already_finalized_transfer_is_left_alone_by_a_second_run() {
            let dir = tempfile::tempdir().unwrap();
            let data = vec![0x42u8; DATALEN * 4];
            seed_store(dir.path(), "dup.bin", &data, 4, &[], &[]);

            let config = RecoveryConfig {
                input_folder: dir.path().to_path_buf(),
                file_basename: "dup.bin".to_string(),
                xor_group_size: 4,
            };
            assert!(recover(&config).unwrap());
            // second run: canonical output already exists, must short-circuit
            // without touching the (already-removed) auxiliary files.
            assert!(recover(&config).unwrap());
        }

        #[test]
        fn unrecoverable_transfer_leaves_the_slice_store_untouched() {
            let dir = tempfile::tempdir().unwrap();
            let data: Vec<u8> = (0..(DATALEN * 4)).map(|i| (i % 223) as u8).collect();
            // xor_group_size == slices == 4: every group spans every slot, so
            // dropping two clear slices makes every group doubly-missing.
            let paths = seed_store(dir.path(), "lost.bin", &data, 4, &[0, 1], &[]);

            let config = RecoveryConfig {
                input_folder: dir.path().to_path_buf(),
                file_basename: "lost.bin".to_string(),
                xor_group_size: 4,
            };
            assert!(!recover(&config).unwrap());
            assert!(!dir.path().join("lost.bin").exists());
            // the slice-store survives so a follow-up transfer (or another
            // recovery pass after more spray rounds land) can still complete it.
            assert!(paths.checksum.exists());
            assert!(paths.clear_list.exists());
        }
    }
}
