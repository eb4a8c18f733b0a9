pub mod command_reader;
pub mod member_writer;
