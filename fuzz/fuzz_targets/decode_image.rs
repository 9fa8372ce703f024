#![no_main]
use libfuzzer_sys::fuzz_target;
use pyrastitch::TiffReader;

fuzz_target!(|data: &[u8]| {
    let mut reader = if let Ok(r) = TiffReader::new(std::io::Cursor::new(data)) {
        r
    } else {
        return;
    };

    for ifd_index in 0..reader.ifds().len() {
        let (rows, cols) = {
            let ifd = match reader.ifd(ifd_index) {
                Ok(ifd) => ifd,
                Err(_) => continue,
            };
            match (ifd.tiles_per_column(), ifd.tiles_per_row()) {
                (Ok(r), Ok(c)) => (r.min(64), c.min(64)),
                _ => continue,
            }
        };
        for ty in 0..rows {
            for tx in 0..cols {
                let _ = reader.read_tile(ifd_index, 0, tx, ty);
            }
        }
    }
});
