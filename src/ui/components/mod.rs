pub mod chat_area;
pub mod chat_list;
pub mod input_bar;
