mod http_converter_test;
