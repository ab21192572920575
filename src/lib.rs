// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod cli;
pub mod commands;
pub mod crypt;
pub mod data;
pub mod db;
pub mod error;
pub mod html;
pub mod models;
pub mod prefs;
pub mod progress;
pub mod task;
pub mod term;
pub mod utils;
pub mod web;
