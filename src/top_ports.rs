//! Common-port tables backing the symbolic port groups

/// The 100 most commonly open TCP ports, most common first.
const TOP_100: [u16; 100] = [
    80, 23, 443, 21, 22, 25, 3389, 110, 445, 139, 143, 53, 135, 3306, 8080, 1723, 111, 995, 993,
    5900, 1025, 587, 8888, 199, 1720, 465, 548, 113, 81, 6001, 10000, 514, 5060, 179, 1026, 2000,
    8443, 8000, 32768, 554, 26, 1433, 49152, 2001, 515, 8008, 49154, 1027, 5666, 646, 5000, 5631,
    631, 49153, 8081, 2049, 88, 79, 5800, 106, 2121, 1110, 49155, 6000, 513, 990, 5357, 427,
    49156, 543, 544, 5101, 144, 7, 389, 8009, 3128, 444, 9999, 5009, 7070, 5190, 3000, 5432,
    1900, 3986, 13, 1029, 9, 5051, 6646, 49157, 1028, 873, 1755, 2717, 4899, 9100, 119, 37,
];

/// Common high ports folded into the top-1000 group on top of 1-1024.
const HIGH_COMMON: [u16; 48] = [
    1433, 1521, 1723, 1755, 1900, 2049, 2121, 2717, 3000, 3128, 3306, 3389, 3986, 4899, 5000,
    5009, 5051, 5060, 5101, 5190, 5357, 5432, 5631, 5666, 5800, 5900, 5984, 6000, 6001, 6379,
    6646, 7070, 8000, 8008, 8009, 8080, 8081, 8443, 8888, 9090, 9100, 9200, 9999, 10000, 27017,
    32768, 49152, 49157,
];

/// The top-100 group, sorted for scanning.
pub fn top_100() -> Vec<u16> {
    let mut ports = TOP_100.to_vec();
    ports.sort_unstable();
    ports
}

/// The top-1000 group: the full well-known range plus common high ports.
pub fn top_1000() -> Vec<u16> {
    let mut ports: Vec<u16> = (1..=1024).collect();
    ports.extend_from_slice(&HIGH_COMMON);
    ports.sort_unstable();
    ports.dedup();
    ports
}
