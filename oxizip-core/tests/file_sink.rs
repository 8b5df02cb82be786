use oxizip_core::sink::{RandomAccessSink, SeekableSink};
use std::io::{Read, Seek, SeekFrom};

#[test]
fn test_file_backed_patch_leaves_other_bytes() {
    let file = tempfile::tempfile().unwrap();
    let mut sink = SeekableSink::new(file).unwrap();

    let payload: Vec<u8> = (0..64u8).collect();
    sink.append(&payload).unwrap();
    sink.write_all_at(&[0xA0, 0xA1, 0xA2, 0xA3], 20).unwrap();
    assert_eq!(sink.position(), 64);
    sink.append(&[0xFF]).unwrap();

    let mut file = sink.into_inner().unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    let mut written = Vec::new();
    file.read_to_end(&mut written).unwrap();

    let mut expected = payload.clone();
    expected[20..24].copy_from_slice(&[0xA0, 0xA1, 0xA2, 0xA3]);
    expected.push(0xFF);
    assert_eq!(written, expected);
}

#[test]
fn test_file_backed_patch_past_end_fails() {
    let file = tempfile::tempfile().unwrap();
    let mut sink = SeekableSink::new(file).unwrap();
    sink.append(&[0u8; 8]).unwrap();
    assert!(sink.write_all_at(&[1, 2, 3, 4], 6).is_err());
    assert_eq!(sink.position(), 8);
}
