use std::fs::File;
use std::io::BufRead;
use crate::error::CacheError;

/// Opens a trace for sequential line-by-line reading
pub fn get_reader(file: File) -> Result<impl BufRead, CacheError> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::BufReader;
        const BUFFER_SIZE: usize = 64 * 4096;
        Ok(BufReader::with_capacity(BUFFER_SIZE, file))
    }
    // Memory map the file on unix systems, traces are read once from front to back
    #[cfg(unix)]
    {
        use std::io::Cursor;
        use memmap2::{Advice, Mmap};
        // Safety: the trace is only read, and isn't expected to change while the simulation runs
        unsafe {
            let m = Mmap::map(&file)?;
            m.advise(Advice::Sequential)?;
            Ok(Cursor::new(m))
        }
    }
}
