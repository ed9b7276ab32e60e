// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::LogRotation;
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use std::{
    env,
    ffi::OsStr,
    fmt,
    io::{self, Write},
    path::Path,
};
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

const DEFAULT_LOG_FILE_STEM: &str = "bax-wallet";

/// Builds a non-blocking writer that rotates `<binary>.log` inside `dir`
/// according to `rotation`.
pub(super) fn file_rotater(dir: &Path, rotation: LogRotation) -> (NonBlocking, WorkerGuard) {
    let binary_name = env::current_exe()
        .map(|path| {
            path.file_stem()
                .unwrap_or(OsStr::new(DEFAULT_LOG_FILE_STEM))
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|_| DEFAULT_LOG_FILE_STEM.to_string());

    let writer = FileRotate::new(
        dir.join(format!("{binary_name}.log")),
        AppendTimestamp::default(FileLimit::MaxFiles(rotation.max_files())),
        ContentLimit::BytesSurpassed(rotation.max_file_bytes),
        Compression::OnRotate(rotation.uncompressed_files),
        #[cfg(unix)]
        None,
    );

    // Exert backpressure instead of dropping lines.
    NonBlockingBuilder::default()
        .lossy(false)
        .finish(RotatingWriter { writer })
}

struct RotatingWriter {
    writer: FileRotate<AppendTimestamp>,
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl fmt::Debug for RotatingWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingWriter").finish()
    }
}
