use std::fs::File;
use std::io::{Read, Result};
use std::path::Path;

/// Chains multiple packet-log files together in a single `Read` object.
///
/// # Examples
///
/// ```rust,no_run
/// use ramses_rf::{FileListReader, LogReader};
///
/// let files: Vec<_> = std::env::args().skip(1).collect();
///
/// let flr = FileListReader::new(files);
/// let mut reader = LogReader::new(flr);
///
/// while let Some(pkt) = reader.read_packet().unwrap() {
///     println!("{}", pkt);
/// }
/// ```
#[derive(Debug)]
pub struct FileListReader<T: AsRef<Path>> {
    file_list: Vec<T>,
    file_index: usize,
    file: Option<File>,
}

impl<T: AsRef<Path>> FileListReader<T> {
    /// Construct a new `FileListReader` from a list of paths.
    pub fn new(file_list: Vec<T>) -> FileListReader<T> {
        FileListReader {
            file_list,
            file_index: 0,
            file: None,
        }
    }
}

impl<T: AsRef<Path>> Read for FileListReader<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            if let Some(ref mut file) = self.file {
                let size = file.read(buf)?;
                if size > 0 {
                    return Ok(size);
                }
            }

            if self.file_index >= self.file_list.len() {
                return Ok(0);
            } else {
                let file = File::open(&self.file_list[self.file_index])?;
                self.file = Some(file);
                self.file_index += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    use crate::log_reader::LogReader;

    #[test]
    fn test_chains_log_files() {
        let dir = std::env::temp_dir().join("ramses-rf-file-list-reader");
        std::fs::create_dir_all(&dir).unwrap();

        let day_1 = dir.join("day_1.log");
        let day_2 = dir.join("day_2.log");
        std::fs::write(
            &day_1,
            "2020-11-28T08:02:15.301351 045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F\n",
        )
        .unwrap();
        std::fs::write(
            &day_2,
            "2020-11-29T08:02:15.301351 053  I --- 13:237335 --:------ 13:237335 3B00 002 00C8\n",
        )
        .unwrap();

        let mut reader = LogReader::new(FileListReader::new(vec![&day_1, &day_2]));

        let mut codes = Vec::new();
        while let Some(pkt) = reader.read_packet().unwrap() {
            codes.push(pkt.code);
        }
        assert_eq!(vec![0x1F09, 0x3B00], codes);

        // a missing file surfaces as an I/O error
        let mut reader = FileListReader::new(vec![dir.join("nonexistent.log")]);
        let mut buf = [0u8; 16];
        assert!(reader.read(&mut buf).is_err());
    }
}
