//! # `std.filesystem`
//!
//! Path and file operations. Paths are byte strings handed to the OS
//! verbatim; no encoding is assumed. Operations that probe a path treat a
//! missing file as an ordinary outcome (null or zero) and raise only on
//! other failures, carrying the `errno` text.
//!
//! ## Notes
//! - `get_properties` uses `lstat`, so symbolic links describe themselves.
//! - `read`/`stream` double their batch size starting at 1 MiB. When an
//!   offset is given the file must be seekable, and positioned reads are
//!   used; otherwise the file is consumed sequentially.
//! - `remove_recursive` walks depth-first with an explicit stack and
//!   treats entries that vanish concurrently as already removed.

use std::fs;
use std::io::Read;
use std::os::unix::fs::{DirEntryExt, FileExt, MetadataExt, OpenOptionsExt, PermissionsExt};

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::{ApiVersion, Global};
use crate::library::{bytes_to_path, invoke_with_values, path_to_bytes};
use crate::value::{skey, Array, Bytes, Object, Value};
use crate::variable::FunRef;

fn is_enoent(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENOENT)
}

pub fn get_real_path(path: &[u8]) -> Result<Option<Bytes>> {
    let path = bytes_to_path(path);
    match fs::canonicalize(&path) {
        Ok(real) => Ok(Some(path_to_bytes(&real))),
        Err(err) if is_enoent(&err) => Ok(None),
        Err(err) => Err(RuntimeError::io_op(
            "realpath",
            &format!("could not resolve path '{}'", path.display()),
            &err,
        )),
    }
}

pub fn get_properties(path: &[u8]) -> Result<Option<Object>> {
    let path = bytes_to_path(path);
    let meta = match fs::symlink_metadata(&path) {
        Ok(meta) => meta,
        Err(err) if is_enoent(&err) => return Ok(None),
        Err(err) => {
            return Err(RuntimeError::io_op(
                "lstat",
                &format!("could not get properties of file '{}'", path.display()),
                &err,
            ))
        }
    };

    let mut stat = Object::new();
    stat.insert(skey("device"), Value::Integer(meta.dev() as i64));
    stat.insert(skey("inode"), Value::Integer(meta.ino() as i64));
    stat.insert(skey("link_count"), Value::Integer(meta.nlink() as i64));
    stat.insert(skey("is_directory"), Value::Boolean(meta.file_type().is_dir()));
    stat.insert(skey("is_symlink"), Value::Boolean(meta.file_type().is_symlink()));
    stat.insert(skey("size"), Value::Integer(meta.size() as i64));
    stat.insert(skey("size_on_disk"), Value::Integer(meta.blocks() as i64 * 512));
    stat.insert(
        skey("time_accessed"),
        Value::Integer(meta.atime() * 1000 + meta.atime_nsec() / 1_000_000),
    );
    stat.insert(
        skey("time_modified"),
        Value::Integer(meta.mtime() * 1000 + meta.mtime_nsec() / 1_000_000),
    );
    Ok(Some(stat))
}

pub fn move_to(path_new: &[u8], path_old: &[u8]) -> Result<()> {
    let path_new = bytes_to_path(path_new);
    let path_old = bytes_to_path(path_old);
    fs::rename(&path_old, &path_new).map_err(|err| {
        RuntimeError::io_op(
            "rename",
            &format!(
                "could not move file '{}' to '{}'",
                path_old.display(),
                path_new.display()
            ),
            &err,
        )
    })
}

enum RmDisp {
    Rmdir,
    Unlink,
    Expand,
}

pub fn remove_recursive(path: &[u8]) -> Result<i64> {
    let root = bytes_to_path(path);

    // Try a plain unlink first.
    match fs::remove_file(&root) {
        Ok(()) => return Ok(1),
        Err(err) if is_enoent(&err) => return Ok(0),
        Err(err)
            if matches!(err.raw_os_error(), Some(libc::EISDIR) | Some(libc::EPERM)) => {}
        Err(err) => {
            return Err(RuntimeError::io_op(
                "unlink",
                &format!("could not remove file '{}'", root.display()),
                &err,
            ))
        }
    }

    // Try removing an empty directory.
    if fs::remove_dir(&root).is_ok() {
        return Ok(1);
    }

    // Expand non-empty directories and remove all contents. Elements are
    // processed in LIFO order, so a directory pushed back as `Rmdir` is
    // revisited only after all of its children.
    let mut stack = vec![(RmDisp::Expand, root)];
    let mut nremoved: i64 = 0;

    while let Some((disp, path)) = stack.pop() {
        match disp {
            RmDisp::Rmdir => match fs::remove_dir(&path) {
                Ok(()) => nremoved += 1,
                Err(err) if is_enoent(&err) => {}
                Err(err) => {
                    return Err(RuntimeError::io_op(
                        "rmdir",
                        &format!("could not remove directory '{}'", path.display()),
                        &err,
                    ))
                }
            },
            RmDisp::Unlink => match fs::remove_file(&path) {
                Ok(()) => nremoved += 1,
                Err(err) if is_enoent(&err) => {}
                Err(err) => {
                    return Err(RuntimeError::io_op(
                        "unlink",
                        &format!("could not remove file '{}'", path.display()),
                        &err,
                    ))
                }
            },
            RmDisp::Expand => {
                stack.push((RmDisp::Rmdir, path.clone()));
                let entries = match fs::read_dir(&path) {
                    Ok(entries) => entries,
                    Err(err) if is_enoent(&err) => continue,
                    Err(err) => {
                        return Err(RuntimeError::io_op(
                            "opendir",
                            &format!("could not open directory '{}'", path.display()),
                            &err,
                        ))
                    }
                };
                for entry in entries {
                    let entry = entry.map_err(|err| {
                        RuntimeError::io_op(
                            "readdir",
                            &format!("could not read directory '{}'", path.display()),
                            &err,
                        )
                    })?;
                    let is_dir = match entry.file_type() {
                        Ok(ftype) => ftype.is_dir(),
                        Err(err) if is_enoent(&err) => continue,
                        Err(err) => {
                            return Err(RuntimeError::io_op(
                                "lstat",
                                &format!("could not get information about '{}'", entry.path().display()),
                                &err,
                            ))
                        }
                    };
                    let disp = if is_dir { RmDisp::Expand } else { RmDisp::Unlink };
                    stack.push((disp, entry.path()));
                }
            }
        }
    }
    Ok(nremoved)
}

pub fn glob_paths(pattern: &[u8]) -> Result<Array> {
    let pattern = String::from_utf8(pattern.to_vec())
        .map_err(|_| RuntimeError::Parse("glob pattern is not valid UTF-8".to_string()))?;
    let walker = glob::glob(&pattern).map_err(|err| {
        RuntimeError::Parse(format!("invalid glob pattern '{pattern}': {err}"))
    })?;

    let mut paths = Array::new();
    for entry in walker {
        let path = entry.map_err(|err| {
            RuntimeError::Io(format!(
                "could not find paths according to '{pattern}'\n[`glob()` failed: {err}]"
            ))
        })?;
        let mut bytes = path_to_bytes(&path);
        // Directories are marked with a trailing slash.
        if path.is_dir() && bytes.last() != Some(&b'/') {
            bytes.push(b'/');
        }
        paths.push(Value::from(bytes));
    }
    Ok(paths)
}

pub fn list(path: &[u8]) -> Result<Option<Object>> {
    let path = bytes_to_path(path);
    let entries = match fs::read_dir(&path) {
        Ok(entries) => entries,
        Err(err) if is_enoent(&err) => return Ok(None),
        Err(err) => {
            return Err(RuntimeError::io_op(
                "opendir",
                &format!("could not open directory '{}'", path.display()),
                &err,
            ))
        }
    };

    let mut listing = Object::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            RuntimeError::io_op(
                "readdir",
                &format!("could not read directory '{}'", path.display()),
                &err,
            )
        })?;
        let ftype = entry.file_type().map_err(|err| {
            RuntimeError::io_op(
                "lstat",
                &format!("could not get information about '{}'", entry.path().display()),
                &err,
            )
        })?;

        let mut record = Object::new();
        record.insert(skey("inode"), Value::Integer(entry.ino() as i64));
        record.insert(skey("is_directory"), Value::Boolean(ftype.is_dir()));
        record.insert(skey("is_symlink"), Value::Boolean(ftype.is_symlink()));

        use std::os::unix::ffi::OsStrExt;
        listing.insert(entry.file_name().as_bytes().to_vec(), Value::from(record));
    }
    Ok(Some(listing))
}

pub fn create_directory(path: &[u8]) -> Result<i64> {
    let path = bytes_to_path(path);
    match fs::create_dir(&path) {
        Ok(()) => Ok(1),
        Err(err) => {
            if err.raw_os_error() == Some(libc::EEXIST) {
                if let Ok(meta) = fs::metadata(&path) {
                    if meta.is_dir() {
                        return Ok(0);
                    }
                }
            }
            Err(RuntimeError::io_op(
                "mkdir",
                &format!("could not create directory '{}'", path.display()),
                &err,
            ))
        }
    }
}

pub fn remove_directory(path: &[u8]) -> Result<i64> {
    let path = bytes_to_path(path);
    match fs::remove_dir(&path) {
        Ok(()) => Ok(1),
        Err(err) if is_enoent(&err) => Ok(0),
        Err(err) => Err(RuntimeError::io_op(
            "rmdir",
            &format!("could not remove directory '{}'", path.display()),
            &err,
        )),
    }
}

pub fn remove(path: &[u8]) -> Result<i64> {
    let path = bytes_to_path(path);
    match fs::remove_file(&path) {
        Ok(()) => Ok(1),
        Err(err) if is_enoent(&err) => Ok(0),
        Err(err) => Err(RuntimeError::io_op(
            "unlink",
            &format!("could not remove file '{}'", path.display()),
            &err,
        )),
    }
}

/// The shared batched reader loop; calls `sink` once per chunk.
fn read_loop(
    path: &std::path::Path,
    offset: Option<i64>,
    limit: Option<i64>,
    mut sink: impl FnMut(i64, &[u8]) -> Result<()>,
) -> Result<i64> {
    if let Some(off) = offset {
        if off < 0 {
            return Err(RuntimeError::Range(format!("negative file offset (offset `{off}`)")));
        }
    }
    let file = fs::File::open(path).map_err(|err| {
        RuntimeError::io_op("open", &format!("could not open file '{}'", path.display()), &err)
    })?;

    let mut file = file;
    let start = offset.unwrap_or(0);
    let mut roffset = start;
    let mut rlimit = limit.unwrap_or(i64::MAX);
    let mut nbatch: usize = 0x8_0000;
    let mut buffer = Bytes::new();

    loop {
        if rlimit <= 0 {
            break;
        }
        nbatch = (nbatch * 2).min(rlimit.clamp(0, i32::MAX as i64) as usize);
        buffer.resize(nbatch, 0);

        let nread = if offset.is_some() {
            // Positioned read; the file must be seekable.
            file.read_at(&mut buffer, roffset as u64).map_err(|err| {
                RuntimeError::io_op("pread", &format!("error reading file '{}'", path.display()), &err)
            })?
        } else {
            file.read(&mut buffer).map_err(|err| {
                RuntimeError::io_op("read", &format!("error reading file '{}'", path.display()), &err)
            })?
        };
        if nread == 0 {
            break;
        }
        sink(roffset, &buffer[..nread])?;
        roffset += nread as i64;
        rlimit -= nread as i64;
    }
    Ok(roffset - start)
}

pub fn read(path: &[u8], offset: Option<i64>, limit: Option<i64>) -> Result<Bytes> {
    let path = bytes_to_path(path);
    let mut data = Bytes::new();
    read_loop(&path, offset, limit, |_, chunk| {
        data.extend_from_slice(chunk);
        Ok(())
    })?;
    Ok(data)
}

pub fn stream(
    global: &Global,
    path: &[u8],
    callback: &FunRef,
    offset: Option<i64>,
    limit: Option<i64>,
) -> Result<i64> {
    let path = bytes_to_path(path);
    read_loop(&path, offset, limit, |roffset, chunk| {
        // The callback's return value is discarded.
        invoke_with_values(
            global,
            callback,
            vec![Value::Integer(roffset), Value::from(chunk.to_vec())],
        )?;
        Ok(())
    })
}

pub fn write(path: &[u8], offset: Option<i64>, data: &[u8]) -> Result<()> {
    if let Some(off) = offset {
        if off < 0 {
            return Err(RuntimeError::Range(format!("negative file offset (offset `{off}`)")));
        }
    }
    let path = bytes_to_path(path);
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .append(true)
        .truncate(false)
        .open(&path)
        .map_err(|err| {
            RuntimeError::io_op(
                "open",
                &format!("could not open file '{}' for writing", path.display()),
                &err,
            )
        })?;

    // Truncating positions the append at exactly `offset`; with no offset
    // the file restarts from zero.
    file.set_len(offset.unwrap_or(0) as u64).map_err(|err| {
        RuntimeError::io_op(
            "ftruncate",
            &format!("could not truncate file '{}'", path.display()),
            &err,
        )
    })?;

    let mut file = file;
    use std::io::Write;
    file.write_all(data).map_err(|err| {
        RuntimeError::io_op("write", &format!("error writing file '{}'", path.display()), &err)
    })
}

pub fn append(path: &[u8], data: &[u8], exclusive: Option<bool>) -> Result<()> {
    let path = bytes_to_path(path);
    let mut options = fs::OpenOptions::new();
    options.write(true).append(true);
    if exclusive == Some(true) {
        options.create_new(true);
    } else {
        options.create(true);
    }
    let mut file = options.open(&path).map_err(|err| {
        RuntimeError::io_op(
            "open",
            &format!("could not open file '{}' for appending", path.display()),
            &err,
        )
    })?;

    use std::io::Write;
    file.write_all(data).map_err(|err| {
        RuntimeError::io_op("write", &format!("error writing file '{}'", path.display()), &err)
    })
}

pub fn copy(path_new: &[u8], path_old: &[u8]) -> Result<()> {
    let path_new = bytes_to_path(path_new);
    let path_old = bytes_to_path(path_old);

    let mut file_old = fs::File::open(&path_old).map_err(|err| {
        RuntimeError::io_op(
            "open",
            &format!("could not open source file '{}'", path_old.display()),
            &err,
        )
    })?;
    let meta = file_old.metadata().map_err(|err| {
        RuntimeError::io_op(
            "fstat",
            &format!("could not get information about source file '{}'", path_old.display()),
            &err,
        )
    })?;

    // The destination starts write-only; the mode is applied last.
    let mut file_new = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o200)
        .open(&path_new)
        .map_err(|err| {
            RuntimeError::io_op(
                "open",
                &format!("could not create destination file '{}'", path_new.display()),
                &err,
            )
        })?;

    std::io::copy(&mut file_old, &mut file_new).map_err(|err| {
        RuntimeError::io_op("read", &format!("error copying file '{}'", path_old.display()), &err)
    })?;

    file_new
        .set_permissions(fs::Permissions::from_mode(meta.permissions().mode() & 0o7777))
        .map_err(|err| {
            RuntimeError::io_op(
                "fchmod",
                &format!("could not set permission of '{}'", path_new.display()),
                &err,
            )
        })
}

pub fn symlink(path_new: &[u8], target: &[u8]) -> Result<()> {
    let path_new = bytes_to_path(path_new);
    let target = bytes_to_path(target);
    std::os::unix::fs::symlink(&target, &path_new).map_err(|err| {
        RuntimeError::io_op(
            "symlink",
            &format!(
                "could not create symbolic link '{}' to '{}'",
                path_new.display(),
                target.display()
            ),
            &err,
        )
    })
}

pub fn create_bindings_filesystem(result: &mut Object, _version: ApiVersion) {
    result.insert(
        skey("get_real_path"),
        Value::from(NativeFunction::new(
            "std.filesystem.get_real_path",
            "path",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(get_real_path(&path)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("get_properties"),
        Value::from(NativeFunction::new(
            "std.filesystem.get_properties",
            "path",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(get_properties(&path)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("move"),
        Value::from(NativeFunction::new(
            "std.filesystem.move",
            "path_new, path_old",
            NativeTarget::VoidA(|mut reader| {
                reader.start_overload();
                let path_new = reader.required_string()?;
                let path_old = reader.required_string()?;
                if reader.end_overload() {
                    return move_to(&path_new, &path_old);
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("copy"),
        Value::from(NativeFunction::new(
            "std.filesystem.copy",
            "path_new, path_old",
            NativeTarget::VoidA(|mut reader| {
                reader.start_overload();
                let path_new = reader.required_string()?;
                let path_old = reader.required_string()?;
                if reader.end_overload() {
                    return copy(&path_new, &path_old);
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("symlink"),
        Value::from(NativeFunction::new(
            "std.filesystem.symlink",
            "path_new, target",
            NativeTarget::VoidA(|mut reader| {
                reader.start_overload();
                let path_new = reader.required_string()?;
                let target = reader.required_string()?;
                if reader.end_overload() {
                    return symlink(&path_new, &target);
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("remove"),
        Value::from(NativeFunction::new(
            "std.filesystem.remove",
            "path",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(remove(&path)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("create_directory"),
        Value::from(NativeFunction::new(
            "std.filesystem.create_directory",
            "path",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(create_directory(&path)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("remove_directory"),
        Value::from(NativeFunction::new(
            "std.filesystem.remove_directory",
            "path",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(remove_directory(&path)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("remove_recursive"),
        Value::from(NativeFunction::new(
            "std.filesystem.remove_recursive",
            "path",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(remove_recursive(&path)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("glob"),
        Value::from(NativeFunction::new(
            "std.filesystem.glob",
            "pattern",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let pattern = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(glob_paths(&pattern)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("list"),
        Value::from(NativeFunction::new(
            "std.filesystem.list",
            "path",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(list(&path)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("read"),
        Value::from(NativeFunction::new(
            "std.filesystem.read",
            "path, [offset], [limit]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                let offset = reader.optional_integer()?;
                let limit = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(read(&path, offset, limit)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("stream"),
        Value::from(NativeFunction::new(
            "std.filesystem.stream",
            "path, callback, [offset], [limit]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                let callback = reader.required_function()?;
                let offset = reader.optional_integer()?;
                let limit = reader.optional_integer()?;
                if reader.end_overload() {
                    let callback = callback.ok_or_else(|| {
                        RuntimeError::Invariant("callback unavailable".to_string())
                    })?;
                    return Ok(Value::from(stream(global, &path, &callback, offset, limit)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("write"),
        Value::from(NativeFunction::new(
            "std.filesystem.write",
            "path, [offset], data",
            NativeTarget::VoidA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                reader.save_state(0);
                let data = reader.required_string()?;
                if reader.end_overload() {
                    return write(&path, None, &data);
                }
                reader.load_state(0);
                let offset = reader.optional_integer()?;
                let data = reader.required_string()?;
                if reader.end_overload() {
                    return write(&path, offset, &data);
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("append"),
        Value::from(NativeFunction::new(
            "std.filesystem.append",
            "path, data, [exclusive]",
            NativeTarget::VoidA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                let data = reader.required_string()?;
                let exclusive = reader.optional_boolean()?;
                if reader.end_overload() {
                    return append(&path, &data, exclusive);
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{NativeFunction, NativeTarget};

    fn pb(path: &std::path::Path) -> Bytes {
        path_to_bytes(path)
    }

    #[test]
    fn write_read_append_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");

        write(&pb(&file), None, b"hello world").unwrap();
        assert_eq!(read(&pb(&file), None, None).unwrap(), b"hello world".to_vec());

        // Writing with an offset truncates there first.
        write(&pb(&file), Some(5), b"!!").unwrap();
        assert_eq!(read(&pb(&file), None, None).unwrap(), b"hello!!".to_vec());

        append(&pb(&file), b"??", None).unwrap();
        assert_eq!(read(&pb(&file), None, None).unwrap(), b"hello!!??".to_vec());

        // Reads honour offset and limit.
        assert_eq!(read(&pb(&file), Some(5), Some(2)).unwrap(), b"!!".to_vec());
        assert_eq!(read(&pb(&file), Some(100), None).unwrap(), b"".to_vec());
        assert!(read(&pb(&file), Some(-1), None).is_err());

        // Exclusive append refuses an existing file.
        assert!(append(&pb(&file), b"x", Some(true)).is_err());
        let fresh = dir.path().join("fresh.bin");
        append(&pb(&fresh), b"x", Some(true)).unwrap();
    }

    #[test]
    fn properties_and_real_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        write(&pb(&file), None, b"1234").unwrap();

        let props = get_properties(&pb(&file)).unwrap().unwrap();
        assert_eq!(props.get(&skey("size")).unwrap(), &Value::Integer(4));
        assert_eq!(props.get(&skey("is_directory")).unwrap(), &Value::Boolean(false));
        assert!(props.get(&skey("inode")).unwrap().as_integer().unwrap() > 0);
        assert!(props.get(&skey("time_modified")).unwrap().as_integer().unwrap() > 0);

        assert!(get_properties(b"/no/such/path").unwrap().is_none());
        assert!(get_real_path(b"/no/such/path").unwrap().is_none());
        let real = get_real_path(&pb(&file)).unwrap().unwrap();
        assert!(real.ends_with(b"f.txt"));
    }

    #[test]
    fn symlinks_report_themselves() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("target.txt");
        write(&pb(&file), None, b"x").unwrap();
        let link = dir.path().join("link.txt");
        symlink(&pb(&link), &pb(&file)).unwrap();

        let props = get_properties(&pb(&link)).unwrap().unwrap();
        assert_eq!(props.get(&skey("is_symlink")).unwrap(), &Value::Boolean(true));
    }

    #[test]
    fn directory_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");

        assert_eq!(create_directory(&pb(&sub)).unwrap(), 1);
        assert_eq!(create_directory(&pb(&sub)).unwrap(), 0);
        assert_eq!(remove_directory(&pb(&sub)).unwrap(), 1);
        assert_eq!(remove_directory(&pb(&sub)).unwrap(), 0);

        let file = dir.path().join("f");
        write(&pb(&file), None, b"").unwrap();
        assert!(create_directory(&pb(&file)).is_err());
    }

    #[test]
    fn listing_and_moving() {
        let dir = tempfile::tempdir().unwrap();
        write(&pb(&dir.path().join("a.txt")), None, b"a").unwrap();
        create_directory(&pb(&dir.path().join("subdir"))).unwrap();

        let entries = list(&pb(dir.path())).unwrap().unwrap();
        assert_eq!(entries.len(), 2);
        let sub = entries.get(&skey("subdir")).unwrap().as_object().unwrap();
        assert_eq!(sub.get(&skey("is_directory")).unwrap(), &Value::Boolean(true));
        assert!(list(b"/no/such/dir").unwrap().is_none());

        move_to(&pb(&dir.path().join("b.txt")), &pb(&dir.path().join("a.txt"))).unwrap();
        assert_eq!(remove(&pb(&dir.path().join("a.txt"))).unwrap(), 0);
        assert_eq!(remove(&pb(&dir.path().join("b.txt"))).unwrap(), 1);
    }

    #[test]
    fn copy_preserves_contents_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        write(&pb(&src), None, b"payload").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o640)).unwrap();

        copy(&pb(&dst), &pb(&src)).unwrap();
        assert_eq!(read(&pb(&dst), None, None).unwrap(), b"payload".to_vec());
        let mode = fs::metadata(&dst).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn recursive_removal_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        create_directory(&pb(&root)).unwrap();
        create_directory(&pb(&root.join("a"))).unwrap();
        write(&pb(&root.join("a/f1")), None, b"1").unwrap();
        write(&pb(&root.join("f2")), None, b"2").unwrap();

        // Four entries: tree, tree/a, tree/a/f1, tree/f2.
        assert_eq!(remove_recursive(&pb(&root)).unwrap(), 4);
        assert_eq!(remove_recursive(&pb(&root)).unwrap(), 0);

        let file = dir.path().join("single");
        write(&pb(&file), None, b"x").unwrap();
        assert_eq!(remove_recursive(&pb(&file)).unwrap(), 1);
    }

    #[test]
    fn globbing_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(&pb(&dir.path().join("x.dat")), None, b"").unwrap();
        create_directory(&pb(&dir.path().join("y"))).unwrap();

        let pattern = format!("{}/*", dir.path().display()).into_bytes();
        let paths = glob_paths(&pattern).unwrap();
        assert_eq!(paths.len(), 2);
        let mut saw_dir = false;
        for p in &paths {
            let s = p.as_string().unwrap();
            if s.ends_with(b"y/") {
                saw_dir = true;
            }
        }
        assert!(saw_dir);
        assert!(glob_paths(b"/definitely/no/such/path/*").unwrap().is_empty());
    }

    #[test]
    fn stream_feeds_offset_and_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("s.bin");
        write(&pb(&file), None, b"0123456789").unwrap();

        let global = Global::new(ApiVersion::V0001_0000);
        let callback: FunRef = NativeFunction::new(
            "test.sink",
            "offset, data",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let offset = reader.required_integer()?;
                let data = reader.required_string()?;
                if reader.end_overload() {
                    assert_eq!(offset, 2);
                    assert_eq!(data, b"2345".to_vec());
                    return Ok(Value::Null);
                }
                Err(reader.no_matching_function_call())
            }),
        );
        let total = stream(&global, &pb(&file), &callback, Some(2), Some(4)).unwrap();
        assert_eq!(total, 4);
    }
}
