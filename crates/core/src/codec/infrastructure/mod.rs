pub mod jpeg_data_uri_codec;
