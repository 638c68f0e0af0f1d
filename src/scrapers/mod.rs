mod lianjia;

pub use lianjia::LianjiaScraper;
