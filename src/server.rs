// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Directory-rooted registry of channels. Each key maps to exactly one bound
// `Channel`; the server owns every channel's FIFO nodes and unlinks them on
// close.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::channel::Channel;
use crate::config::{ChannelOptions, ServerOptions};
use crate::error::{Result, SmipcError};

/// A directory-rooted collection of bound channels.
pub struct Server {
    root: PathBuf,
    options: ServerOptions,
    channels: HashMap<String, Channel>,
}

impl Server {
    /// Open (and optionally create) `root` as this server's channel
    /// directory. Fails if the two FIFO suffixes are identical — a
    /// collision would make the server's and client's own pipes
    /// indistinguishable.
    pub fn open(root: impl Into<PathBuf>, options: ServerOptions) -> Result<Self> {
        let root = root.into();
        if options.s2c_suffix == options.c2s_suffix {
            return Err(SmipcError::Config(format!(
                "s2c_suffix and c2s_suffix must differ, both are '{}'",
                options.s2c_suffix
            )));
        }

        if options.make_root && !root.exists() {
            fs::create_dir_all(&root)?;
        }
        if !root.is_dir() {
            return Err(SmipcError::Config(format!(
                "server root {} is not a directory",
                root.display()
            )));
        }

        Ok(Self {
            root,
            options,
            channels: HashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create and bind a new channel for `key`. Fails if `key` is already
    /// bound on this server.
    pub fn create(&mut self, key: &str, channel_options: ChannelOptions) -> Result<&mut Channel> {
        if self.channels.contains_key(key) {
            return Err(SmipcError::Config(format!(
                "channel key '{key}' is already bound"
            )));
        }
        let channel = Channel::bind_server(
            &self.root,
            key,
            self.options.mode,
            &self.options.s2c_suffix,
            &self.options.c2s_suffix,
            channel_options,
        )?;
        tracing::debug!(key, root = %self.root.display(), "bound channel");
        self.channels.insert(key.to_string(), channel);
        Ok(self.channels.get_mut(key).expect("just inserted"))
    }

    pub fn get(&self, key: &str) -> Option<&Channel> {
        self.channels.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Channel> {
        self.channels.get_mut(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Close and unlink one channel's FIFO nodes.
    pub fn close(&mut self, key: &str) -> Result<()> {
        match self.channels.remove(key) {
            Some(mut channel) => {
                channel.unlink();
                tracing::debug!(key, "closed channel");
                Ok(())
            }
            None => Err(SmipcError::Config(format!("no channel bound for key '{key}'"))),
        }
    }

    /// Close every bound channel.
    pub fn close_all(&mut self) {
        for (_, mut channel) in self.channels.drain() {
            channel.unlink();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close_all();
    }
}
