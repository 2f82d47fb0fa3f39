//! 入出力まわりの共通モジュール

pub mod io;
