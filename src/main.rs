use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use dictconv::dict::{self, Dictionary, Format};
use dictconv::{ConvertOptions, DictCompression, DictionaryMetadata, GermanCollation};

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {program} <input> <output> -f <format> -t <format> [options]\n\
         \n\
         Formats: stardict, bookeen\n\
         \n\
         Options:\n\
         \x20 --ignore-case                lowercase headwords while reading\n\
         \x20 --ignore-synonyms            skip synonym tables on read and write\n\
         \x20 --ignore-sametypesequence    accept .ifo files without sametypesequence\n\
         \x20 --input-encoding <label>     encoding of input definitions (default utf-8)\n\
         \x20 --merge-definitions <sep>    merge same-headword definitions, joined by <sep>\n\
         \x20 --flatten-synonyms           turn each synonym into its own entry\n\
         \x20 --gzip-dict                  compress the StarDict .dict with builtin gzip\n\
         \x20 --dictzip [<path>]           compress the StarDict .dict with dictzip\n\
         \x20 --bookeen-install            produce a single Bookeen .install file\n\
         \x20 --collation <name>           bookeen collation: default or german\n\
         \x20 --title <s>, --author <s>, --email <s>, --website <s>, --year <s>,\n\
         \x20 --license <s>, --copyright <s>, --description <s>, --identifier <s>,\n\
         \x20 --language-from <code>, --language-to <code>"
    );
}

struct Cli {
    input: PathBuf,
    output: PathBuf,
    from: Format,
    to: Format,
    options: ConvertOptions,
    metadata: DictionaryMetadata,
    merge_separator: Option<String>,
    flatten_synonyms: bool,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut positional: Vec<String> = Vec::new();
    let mut from = None;
    let mut to = None;
    let mut options = ConvertOptions::default();
    let mut metadata = DictionaryMetadata::default();
    let mut merge_separator = None;
    let mut flatten_synonyms = false;

    fn value_for<'a>(
        iter: &mut std::iter::Peekable<std::slice::Iter<'a, String>>,
        flag: &str,
    ) -> Result<String, String> {
        iter.next()
            .cloned()
            .ok_or_else(|| format!("{flag} requires an argument"))
    }

    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-f" | "--from" => {
                from = Some(
                    value_for(&mut iter, arg)?
                        .parse()
                        .map_err(|e| format!("{e}"))?,
                )
            }
            "-t" | "--to" => {
                to = Some(
                    value_for(&mut iter, arg)?
                        .parse()
                        .map_err(|e| format!("{e}"))?,
                )
            }
            "--ignore-case" => options.ignore_case = true,
            "--ignore-synonyms" => options.ignore_synonyms = true,
            "--ignore-sametypesequence" => options.ignore_sametypesequence = true,
            "--input-encoding" => {
                let label = value_for(&mut iter, arg)?;
                options.encoding = encoding_rs::Encoding::for_label(label.as_bytes())
                    .ok_or_else(|| format!("unknown encoding label '{label}'"))?;
            }
            "--merge-definitions" => merge_separator = Some(value_for(&mut iter, arg)?),
            "--flatten-synonyms" => flatten_synonyms = true,
            "--gzip-dict" => options.dict_compression = DictCompression::Gzip,
            "--dictzip" => {
                // optional path argument
                let path = iter
                    .peek()
                    .filter(|next| !next.starts_with('-'))
                    .map(|next| PathBuf::from(next.as_str()));
                if path.is_some() {
                    iter.next();
                }
                options.dict_compression = DictCompression::Dictzip { path };
            }
            "--bookeen-install" => options.bookeen_install_file = true,
            "--collation" => match value_for(&mut iter, arg)?.as_str() {
                "default" => {}
                "german" => options.collation = Arc::new(GermanCollation),
                other => return Err(format!("unknown collation '{other}'")),
            },
            "--identifier" => metadata.identifier = value_for(&mut iter, arg)?,
            "--title" => metadata.title = Some(value_for(&mut iter, arg)?),
            "--author" => metadata.author = Some(value_for(&mut iter, arg)?),
            "--email" => metadata.email = Some(value_for(&mut iter, arg)?),
            "--website" => metadata.website = Some(value_for(&mut iter, arg)?),
            "--year" => metadata.year = Some(value_for(&mut iter, arg)?),
            "--license" => metadata.license = Some(value_for(&mut iter, arg)?),
            "--copyright" => metadata.copyright = Some(value_for(&mut iter, arg)?),
            "--description" => metadata.description = Some(value_for(&mut iter, arg)?),
            "--language-from" => metadata.language_from = Some(value_for(&mut iter, arg)?),
            "--language-to" => metadata.language_to = Some(value_for(&mut iter, arg)?),
            other if other.starts_with('-') => return Err(format!("unknown option '{other}'")),
            _ => positional.push(arg.clone()),
        }
    }

    if positional.len() != 2 {
        return Err("expected exactly two positional arguments: <input> <output>".to_string());
    }
    let from = from.ok_or("missing -f/--from format")?;
    let to = to.ok_or("missing -t/--to format")?;

    Ok(Cli {
        input: PathBuf::from(&positional[0]),
        output: PathBuf::from(&positional[1]),
        from,
        to,
        options,
        metadata,
        merge_separator,
        flatten_synonyms,
    })
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("dictconv");

    if args.len() < 2 {
        print_usage(program);
        process::exit(1);
    }

    let cli = match parse_args(&args[1..]) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("ERROR: {message}\n");
            print_usage(program);
            process::exit(1);
        }
    };

    let mut dictionary = Dictionary::new(cli.metadata);
    if let Err(error) = dict::read_dictionary(&mut dictionary, &cli.input, cli.from, &cli.options) {
        eprintln!("ERROR: reading '{}' failed: {error}", cli.input.display());
        process::exit(1);
    }
    println!(
        "Read {} entries ({} unique headwords) from '{}'",
        dictionary.len(),
        dictionary.unique_headwords(),
        cli.input.display()
    );

    if let Some(separator) = &cli.merge_separator {
        dictionary.merge_definitions(None, Some(separator));
        println!("Merged definitions into {} entries", dictionary.len());
    }
    if cli.flatten_synonyms {
        dictionary.flatten_synonyms();
        println!("Flattened synonyms into {} entries", dictionary.len());
    }

    match dict::write_dictionary(&mut dictionary, &cli.output, cli.to, &cli.options) {
        Ok(paths) => {
            for path in paths {
                println!("Wrote '{}'", path.display());
            }
        }
        Err(error) => {
            eprintln!("ERROR: writing '{}' failed: {error}", cli.output.display());
            process::exit(1);
        }
    }
}
