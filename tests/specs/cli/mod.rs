// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

mod common;
mod dead_letters;
mod init;
mod queue;
mod status;
mod sync;
